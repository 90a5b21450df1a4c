//! Human-readable bytecode listings.

use super::instruction::Instruction;
use super::opcode::{OpArg, OpCode, OpFormat};
use super::proto::Proto;
use std::fmt::Write;

fn rk(operand: u32) -> String {
    if Instruction::is_k(operand) {
        format!("k{}", Instruction::index_k(operand))
    } else {
        format!("{}", operand)
    }
}

/// Render one instruction in listing form.
pub fn disasm_instruction(i: u32) -> String {
    let op = Instruction::get_opcode(i);
    let mode = op.mode();
    let a = Instruction::get_a(i);
    match mode.format {
        OpFormat::IABC => {
            let mut out = format!("{:<9} {}", op.name(), a);
            match mode.b {
                OpArg::N => {}
                OpArg::K => {
                    let _ = write!(out, " {}", rk(Instruction::get_b(i)));
                }
                _ => {
                    let _ = write!(out, " {}", Instruction::get_b(i));
                }
            }
            match mode.c {
                OpArg::N => {}
                OpArg::K => {
                    let _ = write!(out, " {}", rk(Instruction::get_c(i)));
                }
                _ => {
                    let _ = write!(out, " {}", Instruction::get_c(i));
                }
            }
            out
        }
        OpFormat::IABx => format!("{:<9} {} {}", op.name(), a, Instruction::get_bx(i)),
        OpFormat::IAsBx => {
            if op == OpCode::Jmp {
                format!("{:<9} {}", op.name(), Instruction::get_sbx(i))
            } else {
                format!("{:<9} {} {}", op.name(), a, Instruction::get_sbx(i))
            }
        }
    }
}

impl Proto {
    /// Produce a `luac -l` style listing of this function and all nested
    /// functions.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.list_into(&mut out, 0);
        out
    }

    fn list_into(&self, out: &mut String, depth: usize) {
        let kind = if depth == 0 { "main" } else { "function" };
        let _ = writeln!(
            out,
            "{} <{}:{},{}> ({} instructions, {} constants, {} upvalues, {} max stack)",
            kind,
            self.source,
            self.linedefined,
            self.lastlinedefined,
            self.code.len(),
            self.k.len(),
            self.upvalues.len(),
            self.maxstacksize,
        );
        for (pc, &i) in self.code.iter().enumerate() {
            let line = self.lineinfo.get(pc).copied().unwrap_or(0);
            let _ = writeln!(out, "\t{}\t[{}]\t{}", pc, line, disasm_instruction(i));
        }
        for (idx, value) in self.k.iter().enumerate() {
            let _ = writeln!(out, "\t; k{} = {}", idx, value);
        }
        for child in &self.p {
            child.list_into(out, depth + 1);
        }
    }
}
