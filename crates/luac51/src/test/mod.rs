// Test module organization
pub mod test_basic;
pub mod test_closures;
pub mod test_errors;
pub mod test_exprs;
pub mod test_properties;
pub mod test_tables;

use crate::{Instruction, OpCode, Proto, Value};

pub(crate) fn compile_ok(src: &str) -> Proto {
    match crate::compile(src, "test") {
        Ok(proto) => proto,
        Err(e) => panic!("compilation failed: {}\nsource: {}", e, src),
    }
}

/// Decoded code listing, one normalized `"OP a b c"` string per
/// instruction (RK constants shown as `kN`).
pub(crate) fn listing(proto: &Proto) -> Vec<String> {
    proto
        .code
        .iter()
        .map(|&i| {
            crate::disasm_instruction(i)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub(crate) fn opcodes(proto: &Proto) -> Vec<OpCode> {
    proto
        .code
        .iter()
        .map(|&i| Instruction::get_opcode(i))
        .collect()
}

pub(crate) fn knums(proto: &Proto) -> Vec<f64> {
    proto
        .k
        .iter()
        .map(|v| match v {
            Value::Number(n) => *n,
            other => panic!("expected number constant, got {}", other),
        })
        .collect()
}

pub(crate) fn kstr(proto: &Proto, idx: usize) -> &str {
    proto.k[idx].as_str().expect("expected string constant")
}
