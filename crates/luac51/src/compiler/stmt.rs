//! Statement parsing and control-flow code generation.

use super::Parser;
use super::code::*;
use super::exp2reg::*;
use super::expdesc::{ExpDesc, ExpKind};
use super::expr::{body, explist1, expr, field_sel, primaryexp};
use super::lexer::TokenKind;
use super::var::*;
use crate::bytecode::{Instruction, OpCode};
use crate::error::CompileResult;
use crate::limits::{MAXCCALLS, MULTRET, NO_JUMP};
use smol_str::SmolStr;

/// Tokens that close a block.
fn block_follow(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::TkElse
            | TokenKind::TkElseIf
            | TokenKind::TkEnd
            | TokenKind::TkUntil
            | TokenKind::TkEof
    )
}

/// Statement list. Returns true when the list was cut short by a
/// `return`/`break`, i.e. control cannot fall off its end.
pub(crate) fn chunk(p: &mut Parser) -> CompileResult<bool> {
    let mut islast = false;
    p.enter_level()?;
    while !islast && !block_follow(p.lex.t.kind) {
        islast = statement(p)?;
        p.test_next(TokenKind::TkSemicolon)?;
        let fs = p.fs();
        debug_assert!(
            fs.proto.maxstacksize >= fs.freereg && fs.freereg >= fs.nactvar,
            "register accounting broken"
        );
        // all temporaries die at the statement boundary
        fs.freereg = fs.nactvar;
    }
    p.leave_level();
    Ok(islast)
}

/// A chunk in its own scope block.
fn block(p: &mut Parser) -> CompileResult<bool> {
    enter_block(p, false);
    let islast = chunk(p)?;
    leave_block(p)?;
    Ok(islast)
}

/// Dispatch one statement; true if it must be the last of its block.
fn statement(p: &mut Parser) -> CompileResult<bool> {
    let line = p.lex.linenumber;
    match p.lex.t.kind {
        TokenKind::TkIf => {
            ifstat(p, line)?;
            Ok(false)
        }
        TokenKind::TkWhile => {
            whilestat(p, line)?;
            Ok(false)
        }
        TokenKind::TkDo => {
            p.next()?;
            block(p)?;
            p.check_match(TokenKind::TkEnd, TokenKind::TkDo, line)?;
            Ok(false)
        }
        TokenKind::TkFor => {
            forstat(p, line)?;
            Ok(false)
        }
        TokenKind::TkRepeat => {
            repeatstat(p, line)?;
            Ok(false)
        }
        TokenKind::TkFunction => {
            funcstat(p, line)?;
            Ok(false)
        }
        TokenKind::TkLocal => {
            p.next()?;
            if p.test_next(TokenKind::TkFunction)? {
                localfunc(p)?;
            } else {
                localstat(p)?;
            }
            Ok(false)
        }
        TokenKind::TkReturn => {
            retstat(p)?;
            Ok(true) // must be last statement
        }
        TokenKind::TkBreak => {
            p.next()?;
            break_stat(p)?;
            Ok(true) // must be last statement
        }
        _ => {
            exprstat(p)?;
            Ok(false)
        }
    }
}

/// Condition expression; returns its false-exit jump list.
fn cond(p: &mut Parser) -> CompileResult<i32> {
    let mut v = expr(p)?;
    if v.kind == ExpKind::VNil {
        v.kind = ExpKind::VFalse; // all falses are equal here
    }
    go_if_true(p.fs(), &mut v)?;
    Ok(v.f)
}

/// `[if|elseif] cond then block`; returns the cond-false list and whether
/// the block cannot fall through.
fn test_then_block(p: &mut Parser) -> CompileResult<(i32, bool)> {
    p.next()?; // skip IF or ELSEIF
    let condexit = cond(p)?;
    p.check_next(TokenKind::TkThen)?;
    let terminated = block(p)?;
    Ok((condexit, terminated))
}

fn ifstat(p: &mut Parser, line: u32) -> CompileResult<()> {
    let (mut flist, mut terminated) = test_then_block(p)?;
    let mut escapelist = NO_JUMP;
    while p.lex.t.kind == TokenKind::TkElseIf {
        if !terminated {
            let j = jump(p.fs())?;
            concat_list(p.fs(), &mut escapelist, j)?;
        }
        patch_to_here(p.fs(), flist)?;
        let (fl, term) = test_then_block(p)?;
        flist = fl;
        terminated = term;
    }
    if p.lex.t.kind == TokenKind::TkElse {
        if !terminated {
            let j = jump(p.fs())?;
            concat_list(p.fs(), &mut escapelist, j)?;
        }
        patch_to_here(p.fs(), flist)?;
        p.next()?; // skip ELSE (after patch, for correct line info)
        block(p)?;
    } else {
        concat_list(p.fs(), &mut escapelist, flist)?;
    }
    patch_to_here(p.fs(), escapelist)?;
    p.check_match(TokenKind::TkEnd, TokenKind::TkIf, line)
}

fn whilestat(p: &mut Parser, line: u32) -> CompileResult<()> {
    p.next()?; // skip WHILE
    let whileinit = get_label(p.fs());
    let condexit = cond(p)?;
    enter_block(p, true);
    p.check_next(TokenKind::TkDo)?;
    block(p)?;
    let back = jump(p.fs())?;
    patch_list(p.fs(), back, whileinit)?;
    p.check_match(TokenKind::TkEnd, TokenKind::TkWhile, line)?;
    leave_block(p)?;
    // false conditions finish the loop
    patch_to_here(p.fs(), condexit)
}

fn repeatstat(p: &mut Parser, line: u32) -> CompileResult<()> {
    let repeat_init = get_label(p.fs());
    enter_block(p, true); // loop block
    enter_block(p, false); // scope block
    p.next()?; // skip REPEAT
    chunk(p)?;
    p.check_match(TokenKind::TkUntil, TokenKind::TkRepeat, line)?;
    // the condition is read inside the scope block: it sees the body's
    // locals
    let condexit = cond(p)?;
    let upval = p.fs_ref().blocks.last().unwrap().upval;
    if !upval {
        leave_block(p)?; // finish scope
        patch_list(p.fs(), condexit, repeat_init)?;
    } else {
        // locals are captured: a plain back-jump would skip the CLOSE
        break_stat(p)?; // if condition then break
        patch_to_here(p.fs(), condexit)?;
        leave_block(p)?; // finish scope, emitting the CLOSE
        let back = jump(p.fs())?;
        patch_list(p.fs(), back, repeat_init)?;
    }
    leave_block(p) // finish loop
}

/// One expression pushed to the stack top.
fn exp1(p: &mut Parser) -> CompileResult<()> {
    let mut e = expr(p)?;
    exp2nextreg(p.fs(), &mut e)
}

/// Shared tail of both for-forms: activate control variables, emit the
/// prep/loop pair, and wire the back edge.
fn forbody(p: &mut Parser, base: u32, line: u32, nvars: usize, isnum: bool) -> CompileResult<()> {
    adjust_local_vars(p, 3); // control variables
    p.check_next(TokenKind::TkDo)?;
    let prep = if isnum {
        code_asbx(p.fs(), OpCode::ForPrep, base, NO_JUMP)?
    } else {
        jump(p.fs())?
    };
    enter_block(p, false); // scope for declared variables
    adjust_local_vars(p, nvars);
    reserve_regs(p.fs(), nvars as u32)?;
    block(p)?;
    leave_block(p)?; // end of scope for declared variables
    patch_to_here(p.fs(), prep)?;
    let endfor = if isnum {
        code_asbx(p.fs(), OpCode::ForLoop, base, NO_JUMP)?
    } else {
        code_abc(p.fs(), OpCode::TForLoop, base, 0, nvars as u32)?
    };
    fix_line(p.fs(), line); // pretend that the loop op starts the loop
    let back = if isnum { endfor } else { jump(p.fs())? };
    patch_list(p.fs(), back, prep + 1)
}

/// `for NAME = start, limit [, step] do ... end`
fn fornum(p: &mut Parser, varname: SmolStr, line: u32) -> CompileResult<()> {
    let base = p.fs_ref().freereg as u32;
    new_localvar(p, SmolStr::new("(for index)"), 0)?;
    new_localvar(p, SmolStr::new("(for limit)"), 1)?;
    new_localvar(p, SmolStr::new("(for step)"), 2)?;
    new_localvar(p, varname, 3)?;
    p.check_next(TokenKind::TkAssign)?;
    exp1(p)?; // initial value
    p.check_next(TokenKind::TkComma)?;
    exp1(p)?; // limit
    if p.test_next(TokenKind::TkComma)? {
        exp1(p)?; // optional step
    } else {
        // default step = 1
        let fs = p.fs();
        let k = number_k(fs, 1.0)?;
        let reg = fs.freereg as u32;
        code_abx(fs, OpCode::LoadK, reg, k)?;
        reserve_regs(fs, 1)?;
    }
    forbody(p, base, line, 1, true)
}

/// `for NAME {, NAME} in explist do ... end`
fn forlist(p: &mut Parser, indexname: SmolStr) -> CompileResult<()> {
    let base = p.fs_ref().freereg as u32;
    // control variables
    new_localvar(p, SmolStr::new("(for generator)"), 0)?;
    new_localvar(p, SmolStr::new("(for state)"), 1)?;
    new_localvar(p, SmolStr::new("(for control)"), 2)?;
    // declared variables
    let mut nvars = 3usize;
    new_localvar(p, indexname, nvars)?;
    nvars += 1;
    while p.test_next(TokenKind::TkComma)? {
        let name = p.check_name()?;
        new_localvar(p, name, nvars)?;
        nvars += 1;
    }
    p.check_next(TokenKind::TkIn)?;
    let line = p.lex.linenumber;
    let (nexps, mut e) = explist1(p)?;
    adjust_assign(p, 3, nexps, &mut e)?;
    check_stack(p.fs(), 3)?; // extra space to call the generator
    forbody(p, base, line, nvars - 3, false)
}

fn forstat(p: &mut Parser, line: u32) -> CompileResult<()> {
    p.next()?; // skip FOR
    enter_block(p, true); // scope for loop and control variables
    let varname = p.check_name()?;
    match p.lex.t.kind {
        TokenKind::TkAssign => fornum(p, varname, line)?,
        TokenKind::TkComma | TokenKind::TkIn => forlist(p, varname)?,
        _ => return Err(p.syntax_error("'=' or 'in' expected")),
    }
    p.check_match(TokenKind::TkEnd, TokenKind::TkFor, line)?;
    leave_block(p)
}

/// `local function NAME body`. The name is active before the body, so the
/// function can call itself.
fn localfunc(p: &mut Parser) -> CompileResult<()> {
    let name = p.check_name()?;
    new_localvar(p, name, 0)?;
    let fs = p.fs();
    let v = ExpDesc::new(ExpKind::VLocal, fs.freereg as i32);
    reserve_regs(fs, 1)?;
    adjust_local_vars(p, 1);
    let line = p.lex.linenumber;
    let mut b = body(p, false, line)?;
    store_var(p.fs(), &v, &mut b)?;
    // debug information only sees the variable from here on
    let fs = p.fs();
    let pc = fs.pc() as u32;
    let index = fs.actvar[fs.nactvar as usize - 1] as usize;
    fs.proto.locvars[index].startpc = pc;
    Ok(())
}

/// `local NAME {, NAME} [= explist]`
fn localstat(p: &mut Parser) -> CompileResult<()> {
    let mut nvars = 0usize;
    loop {
        let name = p.check_name()?;
        new_localvar(p, name, nvars)?;
        nvars += 1;
        if !p.test_next(TokenKind::TkComma)? {
            break;
        }
    }
    let (nexps, mut e) = if p.test_next(TokenKind::TkAssign)? {
        explist1(p)?
    } else {
        (0, ExpDesc::void())
    };
    adjust_assign(p, nvars, nexps, &mut e)?;
    adjust_local_vars(p, nvars);
    Ok(())
}

/// `function NAME{.NAME}[:NAME] body`
fn funcname(p: &mut Parser) -> CompileResult<(ExpDesc, bool)> {
    let mut v = single_var(p)?;
    while p.lex.t.kind == TokenKind::TkDot {
        field_sel(p, &mut v)?;
    }
    let mut needself = false;
    if p.lex.t.kind == TokenKind::TkColon {
        needself = true;
        field_sel(p, &mut v)?;
    }
    Ok((v, needself))
}

fn funcstat(p: &mut Parser, line: u32) -> CompileResult<()> {
    p.next()?; // skip FUNCTION
    let (v, needself) = funcname(p)?;
    let mut b = body(p, needself, line)?;
    store_var(p.fs(), &v, &mut b)?;
    fix_line(p.fs(), line); // the definition "happens" in the first line
    Ok(())
}

/// Rewrite earlier table/key registers that a later `local = ...` store
/// would clobber so they read from a safe copy instead. Conservative: it
/// only compares register numbers, never proves disjointness.
fn check_conflict(p: &mut Parser, lhs: &mut [ExpDesc], v: &ExpDesc) -> CompileResult<()> {
    let fs = p.fs();
    let extra = fs.freereg as i32; // eventual position of the safe copy
    let mut conflict = false;
    for lh in lhs.iter_mut() {
        if lh.kind == ExpKind::VIndexed {
            if lh.info == v.info {
                conflict = true;
                lh.info = extra;
            }
            if lh.aux as i32 == v.info {
                conflict = true;
                lh.aux = extra as u32;
            }
        }
    }
    if conflict {
        code_abc(fs, OpCode::Move, extra as u32, v.info as u32, 0)?;
        reserve_regs(fs, 1)?;
    }
    Ok(())
}

/// The `, primaryexp` / `= explist` tail of a multiple assignment. Stores
/// run in reverse order of the targets, which keeps `a, b = b, a` correct.
fn assignment(p: &mut Parser, lhs: &mut Vec<ExpDesc>, nvars: usize) -> CompileResult<()> {
    if !lhs.last().unwrap().is_var() {
        return Err(p.syntax_error("syntax error"));
    }
    if p.test_next(TokenKind::TkComma)? {
        let nv = primaryexp(p)?;
        if nv.kind == ExpKind::VLocal {
            check_conflict(p, lhs, &nv)?;
        }
        lhs.push(nv);
        let limit = MAXCCALLS - p.nccalls();
        p.fs_ref()
            .check_limit(nvars, limit, "variables in assignment")?;
        assignment(p, lhs, nvars + 1)?;
        lhs.pop();
    } else {
        p.check_next(TokenKind::TkAssign)?;
        let (nexps, mut e) = explist1(p)?;
        if nexps != nvars {
            adjust_assign(p, nvars, nexps, &mut e)?;
            if nexps > nvars {
                // remove extra values
                p.fs().freereg -= (nexps - nvars) as u8;
            }
        } else {
            set_one_ret(p.fs(), &mut e);
            let var = *lhs.last().unwrap();
            return store_var(p.fs(), &var, &mut e);
        }
    }
    // default: this target takes the value on top of the register stack
    let fs = p.fs();
    let mut e = ExpDesc::new(ExpKind::VNonReloc, fs.freereg as i32 - 1);
    let var = *lhs.last().unwrap();
    store_var(fs, &var, &mut e)
}

/// Either a bare call or the head of a multiple assignment.
fn exprstat(p: &mut Parser) -> CompileResult<()> {
    let v = primaryexp(p)?;
    if v.kind == ExpKind::VCall {
        // call statement uses no results
        Instruction::set_c(&mut p.fs().proto.code[v.info as usize], 1);
        Ok(())
    } else {
        let mut lhs = vec![v];
        assignment(p, &mut lhs, 1)
    }
}

fn retstat(p: &mut Parser) -> CompileResult<()> {
    p.next()?; // skip RETURN
    let first;
    let nret;
    if block_follow(p.lex.t.kind) || p.lex.t.kind == TokenKind::TkSemicolon {
        // return no values
        first = 0;
        nret = 0;
    } else {
        let (n, mut e) = explist1(p)?;
        if e.has_multret() {
            set_mult_ret(p.fs(), &e)?;
            if e.kind == ExpKind::VCall && n == 1 {
                // a lone call in return position reuses the frame
                let fs = p.fs();
                let i = &mut fs.proto.code[e.info as usize];
                Instruction::set_opcode(i, OpCode::TailCall);
                debug_assert_eq!(Instruction::get_a(*i), fs.nactvar as u32);
            }
            first = p.fs_ref().nactvar as u32;
            nret = MULTRET; // return all values
        } else if n == 1 {
            first = exp2anyreg(p.fs(), &mut e)?;
            nret = 1;
        } else {
            exp2nextreg(p.fs(), &mut e)?; // values must go to the stack
            let fs = p.fs_ref();
            first = fs.nactvar as u32; // return all active values
            nret = n as i32;
            debug_assert_eq!(nret, fs.freereg as i32 - first as i32);
        }
    }
    ret(p.fs(), first, nret)
}
