//! Auxiliary metadata: Unified Field, Fate, Tile, Platform, Bridge.
//!
//! None of this influences emitted machine code; these records exist so
//! the parser has somewhere to put the values from the source constructs
//! that set them, and so the final report has something to quote.
//! Gathered into a single configuration record mutated by the parser and
//! read only by `report::print`.

/// The `unified { i: .., e: .., r: .. }` triple. Each field clamps to
/// `[0, 1]` at set time, so re-applying the same values is a no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedField {
    pub i: f64,
    pub e: f64,
    pub r: f64,
}

impl Default for UnifiedField {
    fn default() -> Self {
        UnifiedField { i: 0.0, e: 0.0, r: 0.0 }
    }
}

impl UnifiedField {
    pub fn set(&mut self, i: f64, e: f64, r: f64) {
        self.i = i.clamp(0.0, 1.0);
        self.e = e.clamp(0.0, 1.0);
        self.r = r.clamp(0.0, 1.0);
    }
}

/// `fate on`/`fate off` and `limit <N>`.
#[derive(Debug, Clone, Copy)]
pub struct Fate {
    pub enabled: bool,
    /// The marginal threshold set by `limit <N>`, stored as `1/N`. `None`
    /// until `limit` is seen at least once.
    pub marginal_threshold: Option<f64>,
}

impl Default for Fate {
    fn default() -> Self {
        Fate {
            enabled: false,
            marginal_threshold: None,
        }
    }
}

impl Fate {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_limit(&mut self, n: i64) {
        if n != 0 {
            self.marginal_threshold = Some(1.0 / n as f64);
        }
    }
}

/// Bookkeeping for up to 16 named byte ranges, populated by `pool <name>
/// <size> { … }` declarations. The block body itself is skipped without
/// emission like the other `<ident> { … }` forms; only the name and size
/// ahead of the brace are recorded, purely for the final report.
#[derive(Debug, Clone, Default)]
pub struct TilePool {
    tiles: Vec<(String, u64)>,
}

const MAX_TILES: usize = 16;

impl TilePool {
    pub fn record(&mut self, name: &str, bytes: u64) {
        if self.tiles.len() >= MAX_TILES {
            return;
        }
        self.tiles.push((name.to_string(), bytes));
    }

    pub fn total_bytes(&self) -> u64 {
        self.tiles.iter().map(|(_, b)| *b).sum()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Fixed at compile time; `platform.probe` / `bridge.read` / `compat.probe`
/// are purely syntactic and never change it — the value only ever reaches
/// the user through the final report.
pub const PROBED_PLATFORM_ID: &str = "x86_64-linux-freestanding";

/// Everything the auxiliary subsystems touch, gathered in one place.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub unified: UnifiedField,
    pub fate: Fate,
    pub tiles: TilePool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let mut uf = UnifiedField::default();
        uf.set(1.5, -0.2, 0.5);
        assert_eq!(uf, UnifiedField { i: 1.0, e: 0.0, r: 0.5 });
    }

    #[test]
    fn reapplying_same_values_is_idempotent() {
        let mut uf = UnifiedField::default();
        uf.set(0.9, 0.2, 0.5);
        let first = uf;
        uf.set(0.9, 0.2, 0.5);
        assert_eq!(uf, first);
    }

    #[test]
    fn limit_sets_reciprocal_threshold() {
        let mut fate = Fate::default();
        fate.set_limit(4);
        assert_eq!(fate.marginal_threshold, Some(0.25));
    }

    #[test]
    fn tile_pool_tracks_recorded_ranges() {
        let mut pool = TilePool::default();
        pool.record("scratch", 4096);
        pool.record("heap", 65536);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.total_bytes(), 4096 + 65536);
    }

    #[test]
    fn tile_pool_caps_at_sixteen_entries() {
        let mut pool = TilePool::default();
        for i in 0..20 {
            pool.record(&format!("tile{i}"), 8);
        }
        assert_eq!(pool.len(), MAX_TILES);
    }
}
