// Error reporting: classification, positions, messages, limits.

use crate::ErrorKind;

fn compile_err(src: &str) -> crate::CompileError {
    match crate::compile(src, "err") {
        Ok(_) => panic!("expected compilation of {:?} to fail", src),
        Err(e) => e,
    }
}

#[test]
fn missing_name_after_local() {
    let err = compile_err("local 1");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.contains("'<name>' expected"));
    assert_eq!(err.source, "err");
    assert_eq!(err.line, 1);
}

#[test]
fn dangling_assignment() {
    let err = compile_err("x =");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.contains("unexpected symbol"));
}

#[test]
fn dangling_operator() {
    let err = compile_err("x = 1 +");
    assert!(err.message.contains("unexpected symbol"));
}

#[test]
fn statement_after_return() {
    let err = compile_err("return 1 return 2");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.contains("'<eof>' expected"));
}

#[test]
fn unclosed_if_names_the_opening_line() {
    let err = compile_err("if x then\nlocal y = 1\n");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.message.contains("to close 'if' at line 1"), "{}", err.message);
    assert_eq!(err.line, 3);
}

#[test]
fn non_variable_assignment_target() {
    let err = compile_err("f() = 1");
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn vararg_outside_vararg_function() {
    let err = compile_err("local f = function() return ... end");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("cannot use '...' outside a vararg function"));
}

#[test]
fn vararg_in_main_chunk_is_fine() {
    assert!(crate::compile("return ...", "t").is_ok());
}

#[test]
fn ambiguous_call_across_lines() {
    let err = compile_err("f\n(3)");
    assert!(err.message.contains("ambiguous syntax"));
}

#[test]
fn malformed_number_is_lexical() {
    let err = compile_err("local x = 3x7");
    assert_eq!(err.kind, ErrorKind::Lexical);
    assert!(err.message.contains("malformed number"));
}

#[test]
fn unfinished_string_is_lexical() {
    let err = compile_err("local s = \"abc");
    assert_eq!(err.kind, ErrorKind::Lexical);
    assert!(err.message.contains("unfinished string"));
}

#[test]
fn too_many_local_variables() {
    let names: Vec<String> = (1..=201).map(|i| format!("v{}", i)).collect();
    let src = format!("local {}", names.join(", "));
    let err = compile_err(&src);
    assert_eq!(err.kind, ErrorKind::Limit);
    assert!(
        err.message.contains("main function has more than 200 local variables"),
        "{}",
        err.message
    );
}

#[test]
fn too_many_upvalues() {
    // 61 locals all captured by one inner function
    let names: Vec<String> = (1..=61).map(|i| format!("u{}", i)).collect();
    let sum = names.join(" + ");
    let src = format!(
        "local {} \nlocal function f() return {} end",
        names.join(", "),
        sum
    );
    let err = compile_err(&src);
    assert_eq!(err.kind, ErrorKind::Limit);
    assert!(err.message.contains("more than 60 upvalues"), "{}", err.message);
}

#[test]
fn deep_nesting_hits_recursion_limit() {
    let src = format!("return {}x{}", "(".repeat(300), ")".repeat(300));
    let err = compile_err(&src);
    assert_eq!(err.kind, ErrorKind::Limit);
    assert!(err.message.contains("too many syntax levels"));
}

#[test]
fn error_position_tracks_lines() {
    let err = compile_err("local a = 1\nlocal b = 2\nlocal 3");
    assert_eq!(err.line, 3);
}

#[test]
fn display_includes_source_and_line() {
    let err = compile_err("local 1");
    let shown = format!("{}", err);
    assert!(shown.starts_with("err:1: "), "{}", shown);
}
