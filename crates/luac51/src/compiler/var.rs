//! Lexical scope: local variable lifetimes, block enter/leave, and the
//! resolution of a name to local, upvalue, or global.

use super::Parser;
use super::code::{code_abc, concat_list, patch_to_here, reserve_regs};
use super::expdesc::{ExpDesc, ExpKind};
use super::func_state::{BlockCnt, FuncState, UpvalDesc};
use crate::bytecode::{LocVar, OpCode};
use crate::error::CompileResult;
use crate::limits::{MAXUPVALUES, MAXVARS, NO_JUMP, NO_REG};
use smol_str::SmolStr;

/// Declare a local. The slot becomes active (visible to name lookup) only
/// once `adjust_local_vars` runs; `n` counts earlier declarations in the
/// same statement.
pub(crate) fn new_localvar(p: &mut Parser, name: SmolStr, n: usize) -> CompileResult<()> {
    let fs = p.fs();
    fs.check_limit(fs.nactvar as usize + n + 1, MAXVARS, "local variables")?;
    let index = fs.proto.locvars.len() as u16;
    fs.proto.locvars.push(LocVar {
        name,
        startpc: 0,
        endpc: 0,
    });
    debug_assert_eq!(fs.actvar.len(), fs.nactvar as usize + n);
    fs.actvar.push(index);
    Ok(())
}

/// Bring the last `nvars` declared slots into scope.
pub(crate) fn adjust_local_vars(p: &mut Parser, nvars: usize) {
    let fs = p.fs();
    let pc = fs.pc() as u32;
    fs.nactvar += nvars as u8;
    for i in 0..nvars {
        let slot = fs.nactvar as usize - nvars + i;
        let index = fs.actvar[slot] as usize;
        fs.proto.locvars[index].startpc = pc;
    }
}

/// Kill all locals above `tolevel`, recording where they died.
pub(crate) fn remove_vars(p: &mut Parser, tolevel: usize) {
    let fs = p.fs();
    let pc = fs.pc() as u32;
    while fs.nactvar as usize > tolevel {
        fs.nactvar -= 1;
        let index = fs.actvar[fs.nactvar as usize] as usize;
        fs.proto.locvars[index].endpc = pc;
    }
    fs.actvar.truncate(tolevel);
}

/// Look up a name among the active locals, innermost first.
fn search_var(fs: &FuncState, name: &str) -> Option<u32> {
    for slot in (0..fs.nactvar as usize).rev() {
        let index = fs.actvar[slot] as usize;
        if fs.proto.locvars[index].name == name {
            return Some(slot as u32);
        }
    }
    None
}

/// Record that the local at `level` is captured by an inner function, on
/// the innermost block that still contains it.
fn mark_upval(fs: &mut FuncState, level: u32) {
    for bl in fs.blocks.iter_mut().rev() {
        if bl.nactvar as u32 <= level {
            bl.upval = true;
            return;
        }
    }
}

/// Find or add an upvalue slot in `funcs[level]` capturing `v` from the
/// enclosing function.
fn index_upvalue(p: &mut Parser, level: usize, name: &SmolStr, v: &ExpDesc) -> CompileResult<u32> {
    let fs = &mut p.funcs[level];
    for (i, uv) in fs.upvalues.iter().enumerate() {
        if uv.kind == v.kind && uv.info as i32 == v.info {
            debug_assert_eq!(&fs.proto.upvalues[i], name);
            return Ok(i as u32);
        }
    }
    fs.check_limit(fs.upvalues.len() + 1, MAXUPVALUES, "upvalues")?;
    fs.proto.upvalues.push(name.clone());
    fs.upvalues.push(UpvalDesc {
        kind: v.kind,
        info: v.info as u8,
    });
    Ok(fs.upvalues.len() as u32 - 1)
}

/// Resolve `name` at function nesting `level`: a local there, an upvalue
/// captured through the chain, or a global. `base` is true only at the
/// level where the name occurs.
fn single_var_aux(
    p: &mut Parser,
    level: usize,
    name: &SmolStr,
    base: bool,
) -> CompileResult<ExpDesc> {
    if let Some(slot) = search_var(&p.funcs[level], name) {
        if !base {
            // local will be used as an upvalue
            mark_upval(&mut p.funcs[level], slot);
        }
        return Ok(ExpDesc::new(ExpKind::VLocal, slot as i32));
    }
    if level == 0 {
        // no more levels: the name is free
        return Ok(ExpDesc::new(ExpKind::VGlobal, NO_REG as i32));
    }
    let outer = single_var_aux(p, level - 1, name, false)?;
    if outer.kind == ExpKind::VGlobal {
        return Ok(outer);
    }
    // outer resolved to a local or upvalue: capture it here
    let idx = index_upvalue(p, level, name, &outer)?;
    Ok(ExpDesc::new(ExpKind::VUpval, idx as i32))
}

/// Resolve the name under the cursor into a variable descriptor.
pub(crate) fn single_var(p: &mut Parser) -> CompileResult<ExpDesc> {
    let name = p.check_name()?;
    let level = p.funcs.len() - 1;
    let mut var = single_var_aux(p, level, &name, true)?;
    if var.kind == ExpKind::VGlobal {
        // info points to the global's name in the constant pool
        let s = p.lex.strings.intern(&name);
        var.info = super::code::string_k(p.fs(), s)? as i32;
    }
    Ok(var)
}

pub(crate) fn enter_block(p: &mut Parser, isbreakable: bool) {
    let fs = p.fs();
    debug_assert_eq!(fs.freereg, fs.nactvar);
    let nactvar = fs.nactvar;
    fs.blocks.push(BlockCnt {
        breaklist: NO_JUMP,
        nactvar,
        upval: false,
        isbreakable,
    });
}

pub(crate) fn leave_block(p: &mut Parser) -> CompileResult<()> {
    let bl = p.fs().blocks.pop().unwrap();
    remove_vars(p, bl.nactvar as usize);
    let fs = p.fs();
    if bl.upval {
        // runtime must close the captured locals leaving scope
        code_abc(fs, OpCode::Close, bl.nactvar as u32, 0, 0)?;
    }
    // a block either controls scope or breaks (never both)
    debug_assert!(!bl.isbreakable || !bl.upval);
    debug_assert_eq!(bl.nactvar, fs.nactvar);
    fs.freereg = fs.nactvar;
    patch_to_here(fs, bl.breaklist)
}

/// Balance `nvars` assignment targets against `nexps` produced values:
/// an open call/vararg at the tail is widened to provide the difference,
/// missing values become nil, extra values are left to be discarded.
pub(crate) fn adjust_assign(
    p: &mut Parser,
    nvars: usize,
    nexps: usize,
    e: &mut ExpDesc,
) -> CompileResult<()> {
    let fs = p.fs();
    let mut extra = nvars as i32 - nexps as i32;
    if e.has_multret() {
        extra += 1; // includes the call itself
        if extra < 0 {
            extra = 0;
        }
        super::code::set_returns(fs, e, extra)?;
        if extra > 1 {
            reserve_regs(fs, extra as u32 - 1)?;
        }
    } else {
        if e.kind != ExpKind::VVoid {
            super::exp2reg::exp2nextreg(fs, e)?;
        }
        if extra > 0 {
            let reg = fs.freereg as u32;
            reserve_regs(fs, extra as u32)?;
            super::code::nil(fs, reg, extra as u32)?;
        }
    }
    Ok(())
}

/// Register a `break` against the innermost breakable block.
pub(crate) fn break_stat(p: &mut Parser) -> CompileResult<()> {
    let (target, upval) = {
        let fs = p.fs_ref();
        let mut upval = false;
        let mut target = None;
        for (i, bl) in fs.blocks.iter().enumerate().rev() {
            if bl.isbreakable {
                target = Some(i);
                break;
            }
            upval |= bl.upval;
        }
        (target, upval)
    };
    let Some(i) = target else {
        return Err(p.syntax_error("no loop to break"));
    };
    let fs = p.fs();
    if upval {
        let floor = fs.blocks[i].nactvar as u32;
        code_abc(fs, OpCode::Close, floor, 0, 0)?;
    }
    let j = super::code::jump(fs)?;
    let mut list = fs.blocks[i].breaklist;
    concat_list(fs, &mut list, j)?;
    fs.blocks[i].breaklist = list;
    Ok(())
}
