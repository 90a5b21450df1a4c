//! Centralized compiler limits.
//!
//! All magic numbers that bound what the code generator will accept are
//! collected here for easy tuning. Instruction field widths live with the
//! encoding in [`crate::bytecode::Instruction`].

/// Maximum registers in a single function frame.
pub const MAXSTACK: usize = 250;

/// Maximum number of active local variables per function.
pub const MAXVARS: usize = 200;

/// Maximum number of upvalues per function.
pub const MAXUPVALUES: usize = 60;

/// Maximum parser recursion depth (prevents native stack overflow on
/// deeply nested sources).
pub const MAXCCALLS: usize = 200;

/// Number of array items flushed per SETLIST instruction in table
/// constructors.
pub const FIELDS_PER_FLUSH: u32 = 50;

/// Sentinel for an empty jump list. A jump whose sBx still encodes this
/// value is the last node of its list.
pub const NO_JUMP: i32 = -1;

/// "No register" marker, used while a TESTSET destination is undecided.
pub const NO_REG: u32 = crate::bytecode::Instruction::MAXARG_A;

/// Marker for "as many values as produced" in call/return counts.
pub const MULTRET: i32 = -1;
