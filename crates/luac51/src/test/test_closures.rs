// Nested functions, upvalue capture, and closure emission.

use super::*;
use crate::Instruction;

#[test]
fn local_function_can_call_itself() {
    let proto = compile_ok("local function f() return f() end");
    // outer: closure into the (already active) local, capture list follows
    assert_eq!(
        listing(&proto),
        vec!["CLOSURE 0 0", "MOVE 0 0", "RETURN 0 1"]
    );
    let f = &proto.p[0];
    assert_eq!(f.upvalues.len(), 1);
    assert_eq!(f.upvalues[0], "f");
    assert_eq!(
        listing(f),
        vec![
            "GETUPVAL 0 0",
            "TAILCALL 0 1 0",
            "RETURN 0 0",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn closure_captures_local_with_move() {
    let proto = compile_ok("local x = 1 local function get() return x end");
    assert_eq!(
        listing(&proto),
        vec!["LOADK 0 0", "CLOSURE 1 0", "MOVE 0 0", "RETURN 0 1"]
    );
    let get = &proto.p[0];
    assert_eq!(listing(get), vec!["GETUPVAL 0 0", "RETURN 0 2", "RETURN 0 1"]);
    assert_eq!(get.upvalues[0], "x");
}

#[test]
fn transitive_capture_goes_through_upvalue() {
    let proto = compile_ok(
        "local a = 1\n\
         local function outer()\n\
           local function inner() return a end\n\
           return inner\n\
         end",
    );
    let outer = &proto.p[0];
    let inner = &outer.p[0];
    // outer captures the local directly, inner captures outer's upvalue
    assert_eq!(outer.upvalues, vec!["a"]);
    assert_eq!(inner.upvalues, vec!["a"]);
    assert_eq!(listing(&proto)[1], "CLOSURE 1 0");
    assert_eq!(listing(&proto)[2], "MOVE 0 0");
    assert_eq!(listing(outer)[0], "CLOSURE 0 0");
    // the capture pseudo-instruction reads outer's own upvalue 0
    assert_eq!(listing(outer)[1], "GETUPVAL 0 0");
}

#[test]
fn upvalue_store_uses_setupval() {
    let proto = compile_ok("local x = 0 local function set(v) x = v end");
    let set = &proto.p[0];
    assert_eq!(set.numparams, 1);
    assert_eq!(listing(set), vec!["SETUPVAL 0 0", "RETURN 0 1"]);
}

#[test]
fn capture_list_length_matches_upvalue_count() {
    let proto = compile_ok(
        "local a, b, c = 1, 2, 3\n\
         local function f() return a + b + c end",
    );
    let f = &proto.p[0];
    assert_eq!(f.upvalues, vec!["a", "b", "c"]);
    // CLOSURE is followed by exactly one pseudo-instruction per upvalue
    let code = listing(&proto);
    let closure_at = code.iter().position(|s| s.starts_with("CLOSURE")).unwrap();
    assert_eq!(code[closure_at + 1], "MOVE 0 0");
    assert_eq!(code[closure_at + 2], "MOVE 0 1");
    assert_eq!(code[closure_at + 3], "MOVE 0 2");
}

#[test]
fn repeated_use_of_same_upvalue_is_deduplicated() {
    let proto = compile_ok("local x = 1 local function f() return x + x end");
    let f = &proto.p[0];
    assert_eq!(f.upvalues.len(), 1);
}

#[test]
fn block_exit_closes_captured_locals() {
    let proto = compile_ok(
        "local x = 1\n\
         do\n\
           local y = 2\n\
           f = function() return y end\n\
         end\n\
         return x",
    );
    let code = listing(&proto);
    assert!(code.contains(&"CLOSE 1".to_string()), "code: {:?}", code);
}

#[test]
fn break_from_block_with_captures_closes_first() {
    let proto = compile_ok(
        "while true do\n\
           local y = 1\n\
           f = function() return y end\n\
           break\n\
         end",
    );
    let code = listing(&proto);
    let close_at = code.iter().position(|s| s == "CLOSE 0").unwrap();
    // the CLOSE runs before the break's jump
    assert!(code[close_at + 1].starts_with("JMP"));
}

#[test]
fn function_statement_with_dotted_name() {
    let proto = compile_ok("function t.f() end");
    assert_eq!(
        listing(&proto),
        vec![
            "GETGLOBAL 0 0",
            "CLOSURE 1 0",
            "SETTABLE 0 k1 1",
            "RETURN 0 1",
        ]
    );
    assert_eq!(kstr(&proto, 0), "t");
    assert_eq!(kstr(&proto, 1), "f");
}

#[test]
fn method_definition_gets_implicit_self() {
    let proto = compile_ok("function t:m(a) return self, a end");
    let m = &proto.p[0];
    assert_eq!(m.numparams, 2); // self + a
    assert_eq!(m.locvars[0].name, "self");
    assert_eq!(m.locvars[1].name, "a");
}

#[test]
fn vararg_function_forwards_varargs() {
    let proto = compile_ok("local function f(...) return ... end");
    let f = &proto.p[0];
    assert!(f.is_vararg);
    assert_eq!(f.numparams, 0);
    assert_eq!(listing(f), vec!["VARARG 0 0", "RETURN 0 0", "RETURN 0 1"]);
}

#[test]
fn function_line_span_is_recorded() {
    let proto = compile_ok("local f = function()\n\nend\n");
    let f = &proto.p[0];
    assert_eq!(f.linedefined, 1);
    assert_eq!(f.lastlinedefined, 3);
}

#[test]
fn closure_destination_register_is_patched() {
    let proto = compile_ok("local a local g = function() end");
    // CLOSURE's A operand is bound late, when the target register is known
    let i = proto.code[0];
    assert_eq!(Instruction::get_opcode(i), crate::OpCode::Closure);
    assert_eq!(Instruction::get_a(i), 1);
}
