//! Layer 3a — variables and functions.
//!
//! Variables live in one flat, growable array scanned newest-to-oldest so
//! shadowing falls out of declaration order for free. Locals and
//! parameters are dropped in bulk at function exit by rewinding the
//! array's length and the frame-size counter to a checkpoint taken at
//! function entry; globals are never rewound.
use log::warn;

pub const MAX_VARIABLES: usize = 4096;
pub const MAX_FUNCTIONS: usize = 2048;
pub const GLOBAL_BASE: u64 = 0x600000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Parameter,
    Global,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub scope: Scope,
    /// Frame offset for `Local`/`Parameter` (negative for locals, positive
    /// for parameters); meaningless for `Global`.
    pub frame_offset: i32,
    /// Absolute address for `Global`; meaningless otherwise.
    pub address: u64,
}

/// A checkpoint of the variable table and frame-size counter, taken at
/// function entry and restored at function exit.
#[derive(Debug, Clone, Copy)]
pub struct ScopeMark {
    variable_count: usize,
    frame_size: i32,
    in_function: bool,
}

pub struct SymbolTable {
    variables: Vec<Variable>,
    frame_size: i32,
    next_global: u64,
    in_function: bool,
    functions: Vec<Function>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// `[open_brace + 1, close_brace)` byte range of the body in the
    /// source text.
    pub body_span: (usize, usize),
    /// Filled in once the body is actually emitted.
    pub code_offset: Option<usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            variables: Vec::with_capacity(MAX_VARIABLES.min(256)),
            frame_size: 0,
            next_global: GLOBAL_BASE,
            in_function: false,
            functions: Vec::with_capacity(MAX_FUNCTIONS.min(256)),
        }
    }

    pub fn in_function(&self) -> bool {
        self.in_function
    }

    /// Look up a variable by name, scanning from most to least recently
    /// declared, so shadowing is simply a matter of declaration order.
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().rev().find(|v| v.name == name)
    }

    /// Declare a new variable. Locals grow the frame by 8 bytes; globals
    /// are assigned the next 8-byte-aligned absolute address. Silently
    /// refuses once the fixed-size table is full.
    pub fn declare(&mut self, name: &str) -> Variable {
        if self.variables.len() >= MAX_VARIABLES {
            warn!("variable table full, discarding declaration of '{name}'");
            // Still return a usable record so codegen proceeds (it will
            // simply never be found again by lookup, per the open-ended
            // "further inserts are discarded" contract).
            return Variable {
                name: name.to_string(),
                scope: Scope::Global,
                frame_offset: 0,
                address: 0,
            };
        }
        let var = if self.in_function {
            self.frame_size += 8;
            Variable {
                name: name.to_string(),
                scope: Scope::Local,
                frame_offset: -self.frame_size,
                address: 0,
            }
        } else {
            let address = self.next_global;
            self.next_global += 8;
            Variable {
                name: name.to_string(),
                scope: Scope::Global,
                frame_offset: 0,
                address,
            }
        };
        self.variables.push(var.clone());
        var
    }

    /// Install a function's declared parameters as locals with positive
    /// frame offsets: the k-th parameter (1-indexed) sits at `16 + 8*(p-k)`,
    /// since arguments were pushed in call order and the return address
    /// occupies the first 8 bytes above the frame pointer.
    pub fn enter_function(&mut self, params: &[String]) -> ScopeMark {
        let mark = ScopeMark {
            variable_count: self.variables.len(),
            frame_size: self.frame_size,
            in_function: self.in_function,
        };
        self.in_function = true;
        self.frame_size = 0;
        let p = params.len() as i32;
        for (i, name) in params.iter().enumerate() {
            let k = i as i32 + 1;
            let offset = 16 + 8 * (p - k);
            self.variables.push(Variable {
                name: name.clone(),
                scope: Scope::Parameter,
                frame_offset: offset,
                address: 0,
            });
        }
        mark
    }

    /// Drop every local/parameter declared since `mark` and restore the
    /// frame-size counter to what it was on entry.
    pub fn exit_function(&mut self, mark: ScopeMark) {
        self.variables.truncate(mark.variable_count);
        self.frame_size = mark.frame_size;
        self.in_function = mark.in_function;
    }

    pub fn frame_size(&self) -> i32 {
        self.frame_size
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    // ---- functions -----------------------------------------------------

    pub fn declare_function(&mut self, name: &str, params: Vec<String>, body_span: (usize, usize)) {
        if self.functions.len() >= MAX_FUNCTIONS {
            warn!("function table full, discarding declaration of '{name}'");
            return;
        }
        self.functions.push(Function {
            name: name.to_string(),
            params,
            body_span,
            code_offset: None,
        });
    }

    /// Reset the function array without forgetting its capacity, used
    /// between the first-pass scan and the main emission pass so top-level
    /// `fn` statements can re-register their functions in source order.
    pub fn clear_functions(&mut self) {
        self.functions.clear();
    }

    /// First matching function by name. Declaring two functions with the
    /// same name is undefined behaviour by design; this is the lookup a
    /// future caller wiring name resolution through the symbol table
    /// (rather than straight through the fixup label map) would use, and it
    /// resolves to the first declaration to match how labels are placed.
    pub fn lookup_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_count_down_from_minus_eight() {
        let mut st = SymbolTable::new();
        st.enter_function(&[]);
        let a = st.declare("a");
        let b = st.declare("b");
        assert_eq!(a.frame_offset, -8);
        assert_eq!(b.frame_offset, -16);
    }

    #[test]
    fn parameters_follow_p4_invariant() {
        let mut st = SymbolTable::new();
        st.enter_function(&["a".into(), "b".into(), "c".into()]);
        assert_eq!(st.lookup("a").unwrap().frame_offset, 16 + 8 * 2);
        assert_eq!(st.lookup("b").unwrap().frame_offset, 16 + 8 * 1);
        assert_eq!(st.lookup("c").unwrap().frame_offset, 16 + 8 * 0);
    }

    #[test]
    fn globals_follow_p5_layout() {
        let mut st = SymbolTable::new();
        let g0 = st.declare("g0");
        let g1 = st.declare("g1");
        assert_eq!(g0.address, GLOBAL_BASE);
        assert_eq!(g1.address, GLOBAL_BASE + 8);
    }

    #[test]
    fn shadowing_prefers_most_recent() {
        let mut st = SymbolTable::new();
        st.declare("x");
        st.enter_function(&[]);
        st.declare("x");
        assert_eq!(st.lookup("x").unwrap().scope, Scope::Local);
    }

    #[test]
    fn exit_function_restores_checkpoint() {
        let mut st = SymbolTable::new();
        st.declare("g");
        let mark = st.enter_function(&["p".into()]);
        st.declare("local");
        assert_eq!(st.variable_count(), 3);
        st.exit_function(mark);
        assert_eq!(st.variable_count(), 1);
        assert!(st.lookup("p").is_none());
        assert!(st.lookup("g").is_some());
    }

    #[test]
    fn function_lookup_is_first_match() {
        let mut st = SymbolTable::new();
        st.declare_function("f", vec![], (0, 1));
        st.declare_function("f", vec![], (10, 11));
        assert_eq!(st.lookup_function("f").unwrap().body_span, (0, 1));
    }
}
