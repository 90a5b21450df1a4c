//! Expression parsing: precedence climbing, suffixed expressions, table
//! constructors, function bodies, and call argument lists.

use super::Parser;
use super::binop::{UNARY_PRIORITY, get_binop, get_unop, infix, posfix, prefix, priority};
use super::code::*;
use super::exp2reg::*;
use super::expdesc::{ExpDesc, ExpKind};
use super::func_state::FuncState;
use super::lexer::{TokenKind, TokenValue};
use super::stmt::chunk;
use super::var::{adjust_local_vars, new_localvar, single_var};
use crate::bytecode::{Instruction, OpCode};
use crate::error::CompileResult;
use crate::limits::{FIELDS_PER_FLUSH, MULTRET};
use smol_str::SmolStr;

/// Parse one expression.
pub(crate) fn expr(p: &mut Parser) -> CompileResult<ExpDesc> {
    let mut v = ExpDesc::void();
    subexpr(p, &mut v, 0)?;
    Ok(v)
}

/// Precedence climbing: parse a (unary-prefixed) simple expression, then
/// extend it with binary operators binding tighter than `limit`. Returns
/// the first operator that did not bind.
fn subexpr(p: &mut Parser, v: &mut ExpDesc, limit: u8) -> CompileResult<Option<super::binop::BinOp>> {
    p.enter_level()?;
    if let Some(uop) = get_unop(p.lex.t.kind) {
        p.next()?;
        subexpr(p, v, UNARY_PRIORITY)?;
        prefix(p.fs(), uop, v)?;
    } else {
        simpleexp(p, v)?;
    }
    let mut op = get_binop(p.lex.t.kind);
    while let Some(o) = op {
        if priority(o).0 <= limit {
            break;
        }
        p.next()?;
        infix(p.fs(), o, v)?;
        // read sub-expression with higher priority
        let mut v2 = ExpDesc::void();
        let nextop = subexpr(p, &mut v2, priority(o).1)?;
        posfix(p.fs(), o, v, &mut v2)?;
        op = nextop;
    }
    p.leave_level();
    Ok(op)
}

/// Descriptor for a name used as a string constant (field keys, method
/// names).
fn checkname(p: &mut Parser) -> CompileResult<ExpDesc> {
    let name = p.check_name()?;
    let s = p.lex.strings.intern(&name);
    let k = string_k(p.fs(), s)?;
    Ok(ExpDesc::new(ExpKind::VK, k as i32))
}

fn code_string(p: &mut Parser, s: crate::interner::LuaStr) -> CompileResult<ExpDesc> {
    let k = string_k(p.fs(), s)?;
    Ok(ExpDesc::new(ExpKind::VK, k as i32))
}

/// `.NAME` / `:NAME` selector applied to `v`.
pub(crate) fn field_sel(p: &mut Parser, v: &mut ExpDesc) -> CompileResult<()> {
    exp2anyreg(p.fs(), v)?;
    p.next()?; // skip the dot or colon
    let mut key = checkname(p)?;
    indexed(p.fs(), v, &mut key)
}

/// `[ exp ]` subscript.
fn yindex(p: &mut Parser) -> CompileResult<ExpDesc> {
    p.next()?; // skip the '['
    let mut v = expr(p)?;
    exp2val(p.fs(), &mut v)?;
    p.check_next(TokenKind::TkRightBracket)?;
    Ok(v)
}

struct ConsControl {
    /// Last array item read, not yet stored.
    v: ExpDesc,
    /// Register holding the table.
    table_reg: u32,
    /// Total array items.
    na: u32,
    /// Total hash items.
    nh: u32,
    /// Array items pending a SETLIST flush.
    tostore: u32,
}

/// `NAME = exp` or `[exp] = exp` inside a constructor.
fn recfield(p: &mut Parser, cc: &mut ConsControl) -> CompileResult<()> {
    let reg = p.fs_ref().freereg;
    let mut key = if p.lex.t.kind == TokenKind::TkName {
        checkname(p)?
    } else {
        yindex(p)?
    };
    cc.nh += 1;
    p.check_next(TokenKind::TkAssign)?;
    let rkkey = exp2rk(p.fs(), &mut key)?;
    let mut val = expr(p)?;
    let rkval = exp2rk(p.fs(), &mut val)?;
    let table_reg = cc.table_reg;
    code_abc(p.fs(), OpCode::SetTable, table_reg, rkkey, rkval)?;
    p.fs().freereg = reg; // free registers
    Ok(())
}

/// Store the previous array item before reading the next field, flushing a
/// full batch.
fn closelistfield(fs: &mut FuncState, cc: &mut ConsControl) -> CompileResult<()> {
    if cc.v.kind == ExpKind::VVoid {
        return Ok(()); // there is no list item
    }
    exp2nextreg(fs, &mut cc.v)?;
    cc.v.kind = ExpKind::VVoid;
    if cc.tostore == FIELDS_PER_FLUSH {
        set_list(fs, cc.table_reg, cc.na, cc.tostore as i32)?;
        cc.tostore = 0;
    }
    Ok(())
}

/// Store whatever array items remain; an open call/vararg at the end keeps
/// all its values.
fn lastlistfield(fs: &mut FuncState, cc: &mut ConsControl) -> CompileResult<()> {
    if cc.tostore == 0 {
        return Ok(());
    }
    if cc.v.has_multret() {
        set_mult_ret(fs, &cc.v)?;
        set_list(fs, cc.table_reg, cc.na, MULTRET)?;
        // the open tail has no fixed count; leave it out of the size hint
        cc.na -= 1;
    } else {
        if cc.v.kind != ExpKind::VVoid {
            exp2nextreg(fs, &mut cc.v)?;
        }
        set_list(fs, cc.table_reg, cc.na, cc.tostore as i32)?;
    }
    Ok(())
}

fn listfield(p: &mut Parser, cc: &mut ConsControl) -> CompileResult<()> {
    cc.v = expr(p)?;
    cc.na += 1;
    cc.tostore += 1;
    Ok(())
}

/// Table constructor. NEWTABLE is emitted first with empty size hints,
/// patched after the brace closes.
fn constructor(p: &mut Parser, t: &mut ExpDesc) -> CompileResult<()> {
    let line = p.lex.linenumber;
    let pc = code_abc(p.fs(), OpCode::NewTable, 0, 0, 0)?;
    t.init(ExpKind::VReloc, pc);
    exp2nextreg(p.fs(), t)?; // fix the table at the top of the stack
    let mut cc = ConsControl {
        v: ExpDesc::void(),
        table_reg: t.info as u32,
        na: 0,
        nh: 0,
        tostore: 0,
    };
    p.check_next(TokenKind::TkLeftBrace)?;
    loop {
        debug_assert!(cc.v.kind == ExpKind::VVoid || cc.tostore > 0);
        if p.lex.t.kind == TokenKind::TkRightBrace {
            break;
        }
        closelistfield(p.fs(), &mut cc)?;
        match p.lex.t.kind {
            TokenKind::TkName => {
                // a name is a record key only when followed by '='
                if p.lex.lookahead()?.kind == TokenKind::TkAssign {
                    recfield(p, &mut cc)?;
                } else {
                    listfield(p, &mut cc)?;
                }
            }
            TokenKind::TkLeftBracket => recfield(p, &mut cc)?,
            _ => listfield(p, &mut cc)?,
        }
        if !(p.test_next(TokenKind::TkComma)? || p.test_next(TokenKind::TkSemicolon)?) {
            break;
        }
    }
    p.check_match(TokenKind::TkRightBrace, TokenKind::TkLeftBrace, line)?;
    lastlistfield(p.fs(), &mut cc)?;
    let i = &mut p.fs().proto.code[pc as usize];
    Instruction::set_b(i, int2fb(cc.na)); // initial array size
    Instruction::set_c(i, int2fb(cc.nh)); // initial hash size
    Ok(())
}

/// Parameter list of a function body.
fn parlist(p: &mut Parser) -> CompileResult<()> {
    let mut nparams = 0usize;
    if p.lex.t.kind != TokenKind::TkRightParen {
        loop {
            match p.lex.t.kind {
                TokenKind::TkName => {
                    let name = p.check_name()?;
                    new_localvar(p, name, nparams)?;
                    nparams += 1;
                }
                TokenKind::TkDots => {
                    p.next()?;
                    p.fs().proto.is_vararg = true;
                }
                _ => return Err(p.syntax_error("<name> or '...' expected")),
            }
            if p.fs_ref().proto.is_vararg || !p.test_next(TokenKind::TkComma)? {
                break;
            }
        }
    }
    adjust_local_vars(p, nparams);
    let fs = p.fs();
    fs.proto.numparams = fs.nactvar;
    let n = fs.nactvar as u32;
    reserve_regs(fs, n)
}

/// Emit CLOSURE for a finished child function, followed by its capture
/// list: one MOVE or GETUPVAL pseudo-instruction per upvalue, which the VM
/// consumes when building the closure.
fn push_closure(
    p: &mut Parser,
    child: super::func_state::FuncState,
    v: &mut ExpDesc,
) -> CompileResult<()> {
    let fs = p.fs();
    fs.check_limit(
        fs.proto.p.len() + 1,
        Instruction::MAXARG_BX as usize,
        "functions",
    )?;
    let idx = fs.proto.p.len() as u32;
    fs.proto.p.push(child.proto);
    v.init(ExpKind::VReloc, code_abx(fs, OpCode::Closure, 0, idx)?);
    for uv in &child.upvalues {
        let op = if uv.kind == ExpKind::VLocal {
            OpCode::Move
        } else {
            OpCode::GetUpval
        };
        code_abc(fs, op, 0, uv.info as u32, 0)?;
    }
    Ok(())
}

/// Function body: `( parlist ) chunk end`. With `needself`, an implicit
/// `self` parameter comes first.
pub(crate) fn body(p: &mut Parser, needself: bool, line: u32) -> CompileResult<ExpDesc> {
    p.open_func(line);
    p.check_next(TokenKind::TkLeftParen)?;
    if needself {
        new_localvar(p, SmolStr::new("self"), 0)?;
        adjust_local_vars(p, 1);
    }
    parlist(p)?;
    p.check_next(TokenKind::TkRightParen)?;
    chunk(p)?;
    let lastline = p.lex.linenumber;
    p.fs().proto.lastlinedefined = lastline;
    p.check_match(TokenKind::TkEnd, TokenKind::TkFunction, line)?;
    let child = p.close_func()?;
    let mut e = ExpDesc::void();
    push_closure(p, child, &mut e)?;
    Ok(e)
}

/// Expression list; returns the count and the (unclosed) last expression.
pub(crate) fn explist1(p: &mut Parser) -> CompileResult<(usize, ExpDesc)> {
    let mut n = 1;
    let mut v = expr(p)?;
    while p.test_next(TokenKind::TkComma)? {
        exp2nextreg(p.fs(), &mut v)?;
        v = expr(p)?;
        n += 1;
    }
    Ok((n, v))
}

/// Call arguments: `(explist)`, a table constructor, or a string literal.
fn funcargs(p: &mut Parser, f: &mut ExpDesc) -> CompileResult<()> {
    let line = p.lex.linenumber;
    let mut args = ExpDesc::void();
    match p.lex.t.kind {
        TokenKind::TkLeftParen => {
            if line != p.lex.lastline {
                return Err(p.syntax_error("ambiguous syntax (function call x new statement)"));
            }
            p.next()?;
            if p.lex.t.kind != TokenKind::TkRightParen {
                let (_, last) = explist1(p)?;
                args = last;
                set_mult_ret(p.fs(), &args)?;
            }
            p.check_match(TokenKind::TkRightParen, TokenKind::TkLeftParen, line)?;
        }
        TokenKind::TkLeftBrace => constructor(p, &mut args)?,
        TokenKind::TkString => {
            if let TokenValue::Str(s) = p.lex.t.value.clone() {
                args = code_string(p, s)?;
            }
            p.next()?;
        }
        _ => return Err(p.syntax_error("function arguments expected")),
    }
    debug_assert_eq!(f.kind, ExpKind::VNonReloc);
    let base = f.info as u32; // base register for the call
    let nparams = if args.has_multret() {
        MULTRET // open call
    } else {
        if args.kind != ExpKind::VVoid {
            exp2nextreg(p.fs(), &mut args)?; // close last argument
        }
        p.fs_ref().freereg as i32 - (base as i32 + 1)
    };
    f.init(
        ExpKind::VCall,
        code_abc(p.fs(), OpCode::Call, base, (nparams + 1) as u32, 2)?,
    );
    fix_line(p.fs(), line);
    // the call consumes the function and arguments and leaves one result
    p.fs().freereg = base as u8 + 1;
    Ok(())
}

/// `NAME` or a parenthesized expression.
fn prefixexp(p: &mut Parser, v: &mut ExpDesc) -> CompileResult<()> {
    match p.lex.t.kind {
        TokenKind::TkLeftParen => {
            let line = p.lex.linenumber;
            p.next()?;
            *v = expr(p)?;
            p.check_match(TokenKind::TkRightParen, TokenKind::TkLeftParen, line)?;
            discharge_vars(p.fs(), v)
        }
        TokenKind::TkName => {
            *v = single_var(p)?;
            Ok(())
        }
        _ => Err(p.syntax_error("unexpected symbol")),
    }
}

/// Prefix expression followed by any chain of selectors, subscripts,
/// method calls, and call arguments.
pub(crate) fn primaryexp(p: &mut Parser) -> CompileResult<ExpDesc> {
    let mut v = ExpDesc::void();
    prefixexp(p, &mut v)?;
    loop {
        match p.lex.t.kind {
            TokenKind::TkDot => {
                field_sel(p, &mut v)?;
            }
            TokenKind::TkLeftBracket => {
                exp2anyreg(p.fs(), &mut v)?;
                let mut key = yindex(p)?;
                indexed(p.fs(), &mut v, &mut key)?;
            }
            TokenKind::TkColon => {
                p.next()?;
                let mut key = checkname(p)?;
                code_self(p.fs(), &mut v, &mut key)?;
                funcargs(p, &mut v)?;
            }
            TokenKind::TkLeftParen | TokenKind::TkString | TokenKind::TkLeftBrace => {
                exp2nextreg(p.fs(), &mut v)?;
                funcargs(p, &mut v)?;
            }
            _ => return Ok(v),
        }
    }
}

/// Literals, varargs, constructors, function expressions, or a primary
/// expression.
fn simpleexp(p: &mut Parser, v: &mut ExpDesc) -> CompileResult<()> {
    match p.lex.t.kind {
        TokenKind::TkNumber => {
            if let TokenValue::Number(n) = p.lex.t.value {
                *v = ExpDesc::number(n);
            }
        }
        TokenKind::TkString => {
            if let TokenValue::Str(s) = p.lex.t.value.clone() {
                *v = code_string(p, s)?;
            }
        }
        TokenKind::TkNil => v.init(ExpKind::VNil, 0),
        TokenKind::TkTrue => v.init(ExpKind::VTrue, 0),
        TokenKind::TkFalse => v.init(ExpKind::VFalse, 0),
        TokenKind::TkDots => {
            if !p.fs_ref().proto.is_vararg {
                return Err(p.semantic_error("cannot use '...' outside a vararg function"));
            }
            let pc = code_abc(p.fs(), OpCode::Vararg, 0, 1, 0)?;
            v.init(ExpKind::VVararg, pc);
        }
        TokenKind::TkLeftBrace => return constructor(p, v),
        TokenKind::TkFunction => {
            p.next()?;
            let line = p.lex.linenumber;
            *v = body(p, false, line)?;
            return Ok(());
        }
        _ => {
            *v = primaryexp(p)?;
            return Ok(());
        }
    }
    p.next()
}
