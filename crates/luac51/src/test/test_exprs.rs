// Expression compilation: folding, operand forms, short-circuiting.

use super::*;

#[test]
fn constant_folding_addition() {
    let proto = compile_ok("local x = 1 + 2");
    assert_eq!(knums(&proto), vec![3.0]);
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 1"]);
    assert!(!proto.is_vararg || proto.linedefined == 0); // main is vararg
    assert!(proto.maxstacksize >= 2);
}

#[test]
fn folding_chains_through_subexpressions() {
    let proto = compile_ok("local x = 2 * 3 + 1");
    assert_eq!(knums(&proto), vec![7.0]);
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 1"]);
}

#[test]
fn folding_handles_all_arith_ops() {
    let proto = compile_ok("local x = (10 - 4) / 2 % 4 ^ 2");
    // (10-4)/2 = 3, 4^2 = 16, 3 % 16 = 3
    assert_eq!(knums(&proto), vec![3.0]);
}

#[test]
fn unary_minus_folds() {
    let proto = compile_ok("local x = -5");
    assert_eq!(knums(&proto), vec![-5.0]);
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 1"]);
}

#[test]
fn division_by_zero_is_not_folded() {
    let proto = compile_ok("local x = 1 / 0");
    assert_eq!(knums(&proto), vec![1.0, 0.0]);
    assert_eq!(listing(&proto), vec!["DIV 0 k0 k1", "RETURN 0 1"]);
}

#[test]
fn modulo_by_zero_is_not_folded() {
    let proto = compile_ok("local x = 5 % 0");
    assert_eq!(listing(&proto), vec!["MOD 0 k0 k1", "RETURN 0 1"]);
}

#[test]
fn locals_add_into_fresh_register() {
    let proto = compile_ok("local a, b = 10, 20 return a + b");
    assert_eq!(knums(&proto), vec![10.0, 20.0]);
    assert_eq!(
        listing(&proto),
        vec![
            "LOADK 0 0",
            "LOADK 1 1",
            "ADD 2 0 1",
            "RETURN 2 2",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn power_is_right_associative_and_tighter_than_unary() {
    // -2^2 must be -(2^2)
    let proto = compile_ok("local x = -2 ^ 2");
    assert_eq!(knums(&proto), vec![-4.0]);
}

#[test]
fn unary_minus_binds_tighter_than_concat() {
    let proto = compile_ok("local x = -2 .. 3");
    // operand of the minus is just the 2: UNM folds, CONCAT is runtime
    assert_eq!(knums(&proto), vec![-2.0, 3.0]);
    assert_eq!(
        listing(&proto),
        vec!["LOADK 0 0", "LOADK 1 1", "CONCAT 0 0 1", "RETURN 0 1"]
    );
}

#[test]
fn concat_chain_fuses_into_one_instruction() {
    let proto = compile_ok(r#"local a = "x" .. "y" .. "z""#);
    assert_eq!(
        listing(&proto),
        vec![
            "LOADK 0 0",
            "LOADK 1 1",
            "LOADK 2 2",
            "CONCAT 0 0 2",
            "RETURN 0 1",
        ]
    );
    assert_eq!(kstr(&proto, 0), "x");
    assert_eq!(kstr(&proto, 2), "z");
}

#[test]
fn comparison_materializes_through_loadbool_pair() {
    let proto = compile_ok("local a = 1 == 2");
    assert_eq!(
        listing(&proto),
        vec![
            "EQ 1 k0 k1",
            "JMP 1",
            "LOADBOOL 0 0 1",
            "LOADBOOL 0 1 0",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn greater_than_swaps_operands_of_lt() {
    let proto = compile_ok("local a, b local c = a > b");
    // a > b compiles as LT with b, a
    assert_eq!(listing(&proto)[0], "LT 1 1 0");
}

#[test]
fn and_of_locals_uses_testset() {
    let proto = compile_ok("local a, b local c = a and b");
    assert_eq!(
        listing(&proto),
        vec!["TESTSET 2 0 0", "JMP 1", "MOVE 2 1", "RETURN 0 1"]
    );
}

#[test]
fn false_and_left_always_jumps() {
    let proto = compile_ok("local a = false and b");
    assert_eq!(
        listing(&proto),
        vec![
            "JMP 2",
            "GETGLOBAL 0 0",
            "JMP 2",
            "LOADBOOL 0 0 1",
            "LOADBOOL 0 1 0",
            "RETURN 0 1",
        ]
    );
}

#[test]
fn and_with_constant_true_left_vanishes() {
    let proto = compile_ok("local a = 1 and 2");
    // truthy constant on the left of `and` contributes nothing
    assert_eq!(knums(&proto), vec![2.0]);
    assert_eq!(listing(&proto), vec!["LOADK 0 0", "RETURN 0 1"]);
}

#[test]
fn not_on_constants_is_evaluated() {
    let proto = compile_ok("local a = not nil");
    assert_eq!(listing(&proto), vec!["LOADBOOL 0 1 0", "RETURN 0 1"]);
    let proto = compile_ok("local a = not 1");
    assert_eq!(listing(&proto), vec!["LOADBOOL 0 0 0", "RETURN 0 1"]);
}

#[test]
fn not_fuses_into_test() {
    // `if not a then` tests a directly with the opposite condition
    let proto = compile_ok("local a if not a then a = 1 end");
    assert_eq!(
        listing(&proto),
        vec!["TEST 0 0 1", "JMP 1", "LOADK 0 0", "RETURN 0 1"]
    );
}

#[test]
fn length_operator_needs_a_register() {
    let proto = compile_ok("local s = \"abc\" local n = #s");
    assert_eq!(listing(&proto)[1], "LEN 1 0");
}

#[test]
fn global_reads_and_writes() {
    let proto = compile_ok("x = y");
    assert_eq!(
        listing(&proto),
        vec!["GETGLOBAL 0 1", "SETGLOBAL 0 0", "RETURN 0 1"]
    );
    assert_eq!(kstr(&proto, 0), "x");
    assert_eq!(kstr(&proto, 1), "y");
}

#[test]
fn table_reads_use_rk_keys() {
    let proto = compile_ok("local t local v = t.field");
    assert_eq!(listing(&proto)[0], "GETTABLE 1 0 k0");
    assert_eq!(kstr(&proto, 0), "field");
}

#[test]
fn bracket_index_with_expression_key() {
    let proto = compile_ok("local t, i local v = t[i + 1]");
    assert_eq!(
        listing(&proto),
        vec!["ADD 2 1 k0", "GETTABLE 2 0 2", "RETURN 0 1"]
    );
}

#[test]
fn call_in_expression_keeps_one_result() {
    let proto = compile_ok("local a = f()");
    assert_eq!(
        listing(&proto),
        vec!["GETGLOBAL 0 0", "CALL 0 1 2", "RETURN 0 1"]
    );
}

#[test]
fn paren_truncates_multiple_returns() {
    let proto = compile_ok("local a, b = (f())");
    // parenthesized call is closed to exactly one value
    assert_eq!(
        listing(&proto),
        vec![
            "GETGLOBAL 0 0",
            "CALL 0 1 2",
            "LOADNIL 1 1",
            "RETURN 0 1",
        ]
    );
}
