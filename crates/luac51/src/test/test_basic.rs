// Public API surface: entry points, interner sharing, disassembly.

use super::*;
use crate::{StringInterner, Value};

#[test]
fn compile_smoke() {
    let proto = crate::compile("return 1 + 1", "smoke").unwrap();
    assert_eq!(proto.source, "smoke");
    assert_eq!(proto.k, vec![Value::Number(2.0)]);
}

#[test]
fn shared_interner_yields_identical_handles() {
    let mut strings = StringInterner::new();
    let p1 = crate::compile_with(&mut strings, "return \"key\"", "a").unwrap();
    let p2 = crate::compile_with(&mut strings, "local t = {key = 1}", "b").unwrap();
    let s1 = match &p1.k[0] {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, got {}", other),
    };
    let s2 = match &p2.k[0] {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, got {}", other),
    };
    // same byte sequence, same handle
    assert_eq!(s1, s2);
}

#[test]
fn distinct_strings_get_distinct_handles() {
    let mut strings = StringInterner::new();
    let a = strings.intern("a");
    let b = strings.intern("b");
    let a2 = strings.intern("a");
    assert_ne!(a, b);
    assert_eq!(a, a2);
    assert_eq!(strings.len(), 2);
}

#[test]
fn disassembly_is_readable() {
    let proto = compile_ok("local x = 1 return x");
    let text = proto.disassemble();
    assert!(text.contains("LOADK"), "{}", text);
    assert!(text.contains("RETURN"), "{}", text);
    assert!(text.contains("main <test:0,0>"), "{}", text);
}

#[test]
fn disassembly_covers_nested_functions() {
    let proto = compile_ok("local function f() return 1 end");
    let text = proto.disassemble();
    assert!(text.contains("function <test:1,1>"), "{}", text);
}

#[test]
fn locvar_debug_records_survive_scope_exit() {
    let proto = compile_ok("do local inner = 1 end");
    assert_eq!(proto.locvars.len(), 1);
    assert_eq!(proto.locvars[0].name, "inner");
}

#[test]
fn opcode_sequence_helper_works() {
    let proto = compile_ok("local x = y");
    assert_eq!(
        opcodes(&proto),
        vec![crate::OpCode::GetGlobal, crate::OpCode::Return]
    );
}
