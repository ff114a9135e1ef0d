//! The final statistics report printed after a successful compile.
//!
//! Deliberately plain `println!` text rather than `log` output, so it
//! stays script-parseable across runs the same way the compiler's output
//! file is expected to be byte-identical run to run.
use crate::meta::{Metadata, PROBED_PLATFORM_ID};

pub struct Stats {
    pub code_size: usize,
    pub variable_count: usize,
    pub function_count: usize,
}

pub fn print(stats: &Stats, meta: &Metadata) {
    println!("code size: {} bytes", stats.code_size);
    println!("variables: {}", stats.variable_count);
    println!("functions: {}", stats.function_count);
    println!(
        "unified: i={:.2} e={:.2} r={:.2}",
        meta.unified.i, meta.unified.e, meta.unified.r
    );
    println!(
        "tile pool: {} tile(s), {} byte(s)",
        meta.tiles.len(),
        meta.tiles.total_bytes()
    );
    match meta.fate.marginal_threshold {
        Some(t) => println!(
            "fate: {} (limit {:.4})",
            if meta.fate.enabled { "on" } else { "off" },
            t
        ),
        None => println!("fate: {}", if meta.fate.enabled { "on" } else { "off" }),
    }
    println!("platform: {PROBED_PLATFORM_ID}");
}
