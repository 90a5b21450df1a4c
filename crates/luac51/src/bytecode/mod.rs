//! Bytecode model: instruction encoding, the opcode table, and function
//! prototypes.

mod dump;
mod instruction;
mod opcode;
mod proto;

pub use dump::disasm_instruction;
pub use instruction::Instruction;
pub use opcode::{NUM_OPCODES, OpArg, OpCode, OpFormat, OpMode};
pub use proto::{LocVar, Proto};
