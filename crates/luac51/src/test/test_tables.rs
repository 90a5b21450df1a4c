// Table constructors: array batches, record fields, size hints.

use super::*;
use crate::Instruction;

#[test]
fn mixed_constructor_batches_and_hints() {
    let proto = compile_ok("t = {10, 20, 30, x=1}");
    assert_eq!(
        listing(&proto),
        vec![
            "NEWTABLE 0 3 1",
            "LOADK 1 1",
            "LOADK 2 2",
            "LOADK 3 3",
            "SETTABLE 0 k4 k5",
            "SETLIST 0 3 1",
            "SETGLOBAL 0 0",
            "RETURN 0 1",
        ]
    );
    assert_eq!(kstr(&proto, 0), "t");
    assert_eq!(kstr(&proto, 4), "x");
}

#[test]
fn empty_constructor() {
    let proto = compile_ok("local t = {}");
    assert_eq!(listing(&proto), vec!["NEWTABLE 0 0 0", "RETURN 0 1"]);
}

#[test]
fn record_fields_can_use_bracket_keys() {
    let proto = compile_ok("local t = {[1 + 1] = 2}");
    // key and value fold to the same constant
    assert_eq!(
        listing(&proto),
        vec!["NEWTABLE 0 0 1", "SETTABLE 0 k0 k0", "RETURN 0 1"]
    );
    assert_eq!(knums(&proto), vec![2.0]);
}

#[test]
fn long_array_flushes_every_fifty_items() {
    let items: Vec<String> = (1..=51).map(|i| i.to_string()).collect();
    let src = format!("local t = {{{}}}", items.join(", "));
    let proto = compile_ok(&src);
    let code = listing(&proto);
    assert!(code.contains(&"SETLIST 0 50 1".to_string()), "code: {:?}", code);
    assert!(code.contains(&"SETLIST 0 1 2".to_string()), "code: {:?}", code);
    // array hint covers all 51 items, rounded up by the float-byte format
    let b = Instruction::get_b(proto.code[0]);
    assert_eq!(b, 29); // (8 + 5) << 2 rounds 51 up to 52
}

#[test]
fn open_call_tail_keeps_all_results() {
    let proto = compile_ok("local t = {f()}");
    assert_eq!(
        listing(&proto),
        vec![
            "NEWTABLE 0 0 0",
            "GETGLOBAL 1 0",
            "CALL 1 1 0",
            "SETLIST 0 0 1",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn trailing_call_in_middle_is_closed_to_one_value() {
    let proto = compile_ok("local t = {f(), 1}");
    assert_eq!(
        listing(&proto),
        vec![
            "NEWTABLE 0 2 0",
            "GETGLOBAL 1 0",
            "CALL 1 1 2",
            "LOADK 2 1",
            "SETLIST 0 2 1",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn nested_constructors() {
    let proto = compile_ok("local t = {a = {}}");
    assert_eq!(
        listing(&proto),
        vec![
            "NEWTABLE 0 0 1",
            "NEWTABLE 1 0 0",
            "SETTABLE 0 k0 1",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn semicolon_separators_are_accepted() {
    let proto = compile_ok("local t = {1; 2, 3}");
    let code = listing(&proto);
    assert!(code.contains(&"SETLIST 0 3 1".to_string()), "code: {:?}", code);
}

#[test]
fn table_store_uses_rk_value_when_constant() {
    let proto = compile_ok("local t t.x = 5");
    assert_eq!(
        listing(&proto),
        vec!["SETTABLE 0 k0 k1", "RETURN 0 1"]
    );
    assert_eq!(kstr(&proto, 0), "x");
}
