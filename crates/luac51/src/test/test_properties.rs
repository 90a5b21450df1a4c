// Structural invariants of produced prototypes.

use super::*;
use crate::bytecode::{OpArg, OpFormat};
use crate::{Instruction, OpCode, Proto, Value};

#[test]
fn literal_returns_compile_to_minimal_code() {
    let proto = compile_ok("return 7");
    assert_eq!(proto.k, vec![Value::Number(7.0)]);
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 2", "RETURN 0 1"]);

    let proto = compile_ok("return true");
    assert_eq!(
        listing(&proto),
        vec!["LOADBOOL 0 1 0", "RETURN 0 2", "RETURN 0 1"]
    );

    let proto = compile_ok(r#"return "hi""#);
    assert_eq!(kstr(&proto, 0), "hi");
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 2", "RETURN 0 1"]);

    // fresh registers are already nil, so the load is elided entirely
    let proto = compile_ok("return nil");
    assert_eq!(listing(&proto), vec!["RETURN 0 2", "RETURN 0 1"]);
}

#[test]
fn lineinfo_parallels_code() {
    let proto = compile_ok("local a = 1\nlocal b = 2\nreturn a + b\n");
    check_lineinfo(&proto);
}

fn check_lineinfo(proto: &Proto) {
    assert_eq!(proto.code.len(), proto.lineinfo.len());
    for child in &proto.p {
        check_lineinfo(child);
    }
}

#[test]
fn constants_are_deduplicated() {
    let proto = compile_ok(
        "local a = \"s\"\nlocal b = \"s\"\nlocal c = 1\nlocal d = 1\nlocal e = 1 + 0",
    );
    // "s" and 1 appear once each; 1 + 0 folds to the existing 1 without
    // ever interning the 0
    assert_eq!(proto.k.len(), 2);
}

#[test]
fn boolean_and_nil_constants_dedup_too() {
    let proto = compile_ok("local t = {} t[true] = 1 t[true] = 2");
    let trues = proto
        .k
        .iter()
        .filter(|v| matches!(v, Value::Bool(true)))
        .count();
    assert_eq!(trues, 1);
}

/// Every register an instruction references must be below maxstacksize.
fn check_register_bounds(proto: &Proto) {
    let max = proto.maxstacksize as u32;
    for &i in &proto.code {
        let op = Instruction::get_opcode(i);
        let mode = op.mode();
        if mode.set_a && op != OpCode::TestSet {
            // TESTSET may carry the NO_REG placeholder until demoted
            assert!(Instruction::get_a(i) < max, "A out of range in {}", op.name());
        }
        if mode.format == OpFormat::IABC {
            for (arg, val) in [(mode.b, Instruction::get_b(i)), (mode.c, Instruction::get_c(i))] {
                let is_reg = match arg {
                    OpArg::R => true,
                    OpArg::K => !Instruction::is_k(val),
                    _ => false,
                };
                if is_reg {
                    assert!(val < max, "operand {} out of range in {}", val, op.name());
                }
            }
        }
    }
    for child in &proto.p {
        check_register_bounds(child);
    }
}

#[test]
fn maxstacksize_covers_all_register_operands() {
    let sources = [
        "local a, b, c = 1, 2, 3 return a + b * c",
        "local t = {1, 2, {3, x = 4}} return t[1] + #t",
        "for i = 1, 10 do local x = i * 2 end",
        "local function f(a, b) return a(b), b end return f(print, 3)",
        "local a = x and y or z",
        "while x do local p, q = y, z p[q] = q end",
    ];
    for src in sources {
        check_register_bounds(&compile_ok(src));
    }
}

#[test]
fn maxstacksize_has_the_baseline_of_two() {
    let proto = compile_ok("");
    assert_eq!(listing(&proto), vec!["RETURN 0 1"]);
    assert_eq!(proto.maxstacksize, 2);
}

#[test]
fn jump_targets_stay_inside_code() {
    let sources = [
        "if a then b = 1 elseif c then b = 2 else b = 3 end",
        "while a do if b then break end end",
        "repeat local x = f() until x",
        "for i = 1, 2 do for j = 1, 2 do end end",
        "local a = x and y and z or w",
    ];
    for src in sources {
        let proto = compile_ok(src);
        let len = proto.code.len() as i32;
        for (pc, &i) in proto.code.iter().enumerate() {
            let op = Instruction::get_opcode(i);
            if matches!(op, OpCode::Jmp | OpCode::ForPrep | OpCode::ForLoop) {
                let target = pc as i32 + 1 + Instruction::get_sbx(i);
                assert!(
                    target >= 0 && target <= len,
                    "jump at {} lands at {} (len {}) in {:?}",
                    pc,
                    target,
                    len,
                    src
                );
            }
        }
    }
}

#[test]
fn main_chunk_shape() {
    let proto = compile_ok("local x = 1");
    assert_eq!(proto.numparams, 0);
    assert!(proto.is_vararg);
    assert_eq!(proto.linedefined, 0);
    assert_eq!(proto.source, "test");
}
