//! Compiled function prototypes.

use crate::value::Value;
use smol_str::SmolStr;

/// Debug record for one local variable, covering its live pc range.
#[derive(Debug, Clone)]
pub struct LocVar {
    pub name: SmolStr,
    /// First pc where the variable is active.
    pub startpc: u32,
    /// First pc where the variable is dead.
    pub endpc: u32,
}

/// A compiled function prototype: the output unit of the compiler.
///
/// `code` and `lineinfo` always have the same length. Nested functions are
/// owned children in `p`, referenced by CLOSURE instructions; the
/// MOVE/GETUPVAL pseudo-instructions following each CLOSURE form its
/// upvalue capture list, one per entry of the child's `upvalues`.
#[derive(Debug, Clone)]
pub struct Proto {
    pub code: Vec<u32>,
    /// Source line of each instruction, parallel to `code`.
    pub lineinfo: Vec<u32>,
    /// Constant pool, duplicates collapsed.
    pub k: Vec<Value>,
    /// Prototypes of nested functions.
    pub p: Vec<Proto>,
    /// Debug records for every local ever declared in this function.
    pub locvars: Vec<LocVar>,
    /// Names of captured variables.
    pub upvalues: Vec<SmolStr>,
    pub numparams: u8,
    pub is_vararg: bool,
    /// Upper bound on registers used by this function.
    pub maxstacksize: u8,
    /// Chunk name, used verbatim in error messages.
    pub source: SmolStr,
    pub linedefined: u32,
    pub lastlinedefined: u32,
}

impl Proto {
    pub fn new(source: SmolStr, linedefined: u32) -> Self {
        Proto {
            code: Vec::new(),
            lineinfo: Vec::new(),
            k: Vec::new(),
            p: Vec::new(),
            locvars: Vec::new(),
            upvalues: Vec::new(),
            numparams: 0,
            is_vararg: false,
            // registers 0/1 are always valid
            maxstacksize: 2,
            source,
            linedefined,
            lastlinedefined: 0,
        }
    }

    /// Release over-allocation once compilation of this function is done.
    pub(crate) fn shrink(&mut self) {
        self.code.shrink_to_fit();
        self.lineinfo.shrink_to_fit();
        self.k.shrink_to_fit();
        self.p.shrink_to_fit();
        self.locvars.shrink_to_fit();
        self.upvalues.shrink_to_fit();
    }
}
