//! Per-function compile state.

use crate::bytecode::Proto;
use super::expdesc::ExpKind;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::interner::LuaStr;
use crate::limits::NO_JUMP;
use ahash::RandomState;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Key for the constant-dedup map. Numbers are keyed on their bit pattern,
/// strings on their interned identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ConstKey {
    Nil,
    Bool(bool),
    Number(u64),
    Str(LuaStr),
}

impl ConstKey {
    pub fn number(n: f64) -> Self {
        ConstKey::Number(n.to_bits())
    }
}

/// One lexical block: delimits local lifetimes and collects `break` jumps.
pub(crate) struct BlockCnt {
    /// Jump list of break statements awaiting the block exit.
    pub breaklist: i32,
    /// Active locals outside the block, restored on leave.
    pub nactvar: u8,
    /// Some local in the block is captured by an inner closure.
    pub upval: bool,
    /// True for loop blocks; `break` targets the innermost one.
    pub isbreakable: bool,
}

/// How an upvalue is found in the enclosing function: either one of its
/// locals (kind `VLocal`, info = register) or one of its own upvalues
/// (kind `VUpval`, info = upvalue index).
#[derive(Debug, Clone, Copy)]
pub(crate) struct UpvalDesc {
    pub kind: ExpKind,
    pub info: u8,
}

/// Scratch state for one function body under compilation. Functions nest,
/// so these live on a stack; upvalue resolution walks it outward.
pub(crate) struct FuncState {
    /// The prototype being filled in.
    pub proto: Proto,
    /// Constant value -> pool index.
    pub const_map: HashMap<ConstKey, u32, RandomState>,
    /// Capture descriptors, parallel to `proto.upvalues`.
    pub upvalues: Vec<UpvalDesc>,
    /// Active (and pending) local slots, as indices into `proto.locvars`.
    /// Entries past `nactvar` are declared but not yet in scope.
    pub actvar: Vec<u16>,
    /// Number of active local variables.
    pub nactvar: u8,
    /// First free register.
    pub freereg: u8,
    /// List of pending jumps to the next emitted instruction.
    pub jpc: i32,
    /// pc of the last jump target, to avoid optimizations across labels.
    pub lasttarget: i32,
    /// Stack of enclosing blocks, innermost last.
    pub blocks: Vec<BlockCnt>,
    /// Line stamped on emitted instructions.
    pub lastline: u32,
}

impl FuncState {
    pub fn new(source: SmolStr, linedefined: u32) -> Self {
        FuncState {
            proto: Proto::new(source, linedefined),
            const_map: HashMap::with_hasher(RandomState::new()),
            upvalues: Vec::new(),
            actvar: Vec::new(),
            nactvar: 0,
            freereg: 0,
            jpc: NO_JUMP,
            lasttarget: NO_JUMP,
            blocks: Vec::new(),
            lastline: linedefined.max(1),
        }
    }

    /// Next code slot to be written.
    #[inline(always)]
    pub fn pc(&self) -> i32 {
        self.proto.code.len() as i32
    }

    /// Error raised from inside the code generator, positioned at the last
    /// consumed token.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, self.proto.source.clone(), self.lastline, message.into())
    }

    /// "too many X" error in the shape Lua reports it.
    pub fn limit_error(&self, limit: usize, what: &str) -> CompileError {
        let message = if self.proto.linedefined == 0 {
            format!("main function has more than {} {}", limit, what)
        } else {
            format!(
                "function at line {} has more than {} {}",
                self.proto.linedefined, limit, what
            )
        };
        self.error(ErrorKind::Limit, message)
    }

    pub fn check_limit(&self, value: usize, limit: usize, what: &str) -> CompileResult<()> {
        if value > limit {
            Err(self.limit_error(limit, what))
        } else {
            Ok(())
        }
    }
}
