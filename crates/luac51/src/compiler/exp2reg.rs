//! Expression discharge: turning descriptors into registers, RK operands,
//! and stores, and reconciling short-circuit jump lists with produced
//! values.

use super::code::*;
use super::expdesc::{ExpDesc, ExpKind};
use super::func_state::FuncState;
use crate::bytecode::{Instruction, OpCode};
use crate::error::CompileResult;
use crate::limits::{NO_JUMP, NO_REG};

/// Resolve variable-kind descriptors into values: locals become registers,
/// upvalue/global/table reads are emitted with an open destination, and
/// open calls/varargs are closed to one result.
pub(crate) fn discharge_vars(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    match e.kind {
        ExpKind::VLocal => {
            e.kind = ExpKind::VNonReloc;
        }
        ExpKind::VUpval => {
            e.info = code_abc(fs, OpCode::GetUpval, 0, e.info as u32, 0)?;
            e.kind = ExpKind::VReloc;
        }
        ExpKind::VGlobal => {
            e.info = code_abx(fs, OpCode::GetGlobal, 0, e.info as u32)?;
            e.kind = ExpKind::VReloc;
        }
        ExpKind::VIndexed => {
            free_reg(fs, e.aux);
            free_reg(fs, e.info as u32);
            e.info = code_abc(fs, OpCode::GetTable, 0, e.info as u32, e.aux)?;
            e.kind = ExpKind::VReloc;
        }
        ExpKind::VCall | ExpKind::VVararg => {
            set_one_ret(fs, e);
        }
        _ => {}
    }
    Ok(())
}

/// Emit a LOADBOOL that doubles as a jump target.
fn code_label(fs: &mut FuncState, a: u32, b: u32, jump: u32) -> CompileResult<i32> {
    get_label(fs);
    code_abc(fs, OpCode::LoadBool, a, b, jump)
}

/// Put the (jump-free) value of `e` into register `reg`.
fn discharge2reg(fs: &mut FuncState, e: &mut ExpDesc, reg: u32) -> CompileResult<()> {
    discharge_vars(fs, e)?;
    match e.kind {
        ExpKind::VNil => {
            nil(fs, reg, 1)?;
        }
        ExpKind::VFalse | ExpKind::VTrue => {
            code_abc(fs, OpCode::LoadBool, reg, (e.kind == ExpKind::VTrue) as u32, 0)?;
        }
        ExpKind::VK => {
            code_abx(fs, OpCode::LoadK, reg, e.info as u32)?;
        }
        ExpKind::VKNum => {
            let k = number_k(fs, e.nval)?;
            code_abx(fs, OpCode::LoadK, reg, k)?;
        }
        ExpKind::VReloc => {
            Instruction::set_a(&mut fs.proto.code[e.info as usize], reg);
        }
        ExpKind::VNonReloc => {
            if reg != e.info as u32 {
                code_abc(fs, OpCode::Move, reg, e.info as u32, 0)?;
            }
        }
        _ => {
            debug_assert!(e.kind == ExpKind::VVoid || e.kind == ExpKind::VJmp);
            return Ok(());
        }
    }
    e.info = reg as i32;
    e.kind = ExpKind::VNonReloc;
    Ok(())
}

fn discharge2anyreg(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    if e.kind != ExpKind::VNonReloc {
        reserve_regs(fs, 1)?;
        let reg = fs.freereg as u32 - 1;
        discharge2reg(fs, e, reg)?;
    }
    Ok(())
}

/// Place `e` in `reg`, materializing its jump lists: paths that only tested
/// (no TESTSET) load explicit booleans through a pair of LOADBOOL labels.
pub(crate) fn exp2reg(fs: &mut FuncState, e: &mut ExpDesc, reg: u32) -> CompileResult<()> {
    discharge2reg(fs, e, reg)?;
    if e.kind == ExpKind::VJmp {
        let info = e.info;
        concat_list(fs, &mut e.t, info)?;
    }
    if e.has_jumps() {
        let mut p_f = NO_JUMP; // load false label
        let mut p_t = NO_JUMP; // load true label
        if need_value(fs, e.t) || need_value(fs, e.f) {
            let fj = if e.kind == ExpKind::VJmp {
                NO_JUMP
            } else {
                jump(fs)?
            };
            p_f = code_label(fs, reg, 0, 1)?;
            p_t = code_label(fs, reg, 1, 0)?;
            patch_to_here(fs, fj)?;
        }
        let end = get_label(fs);
        patch_list_aux(fs, e.f, end, reg, p_f)?;
        patch_list_aux(fs, e.t, end, reg, p_t)?;
    }
    e.f = NO_JUMP;
    e.t = NO_JUMP;
    e.info = reg as i32;
    e.kind = ExpKind::VNonReloc;
    Ok(())
}

/// Place `e` in the next free register.
pub(crate) fn exp2nextreg(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    discharge_vars(fs, e)?;
    free_exp(fs, e);
    reserve_regs(fs, 1)?;
    let reg = fs.freereg as u32 - 1;
    exp2reg(fs, e, reg)
}

/// Place `e` in some register and return it; a value already sitting in a
/// register is reused when possible.
pub(crate) fn exp2anyreg(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<u32> {
    discharge_vars(fs, e)?;
    if e.kind == ExpKind::VNonReloc {
        if !e.has_jumps() {
            return Ok(e.info as u32);
        }
        if e.info as u32 >= fs.nactvar as u32 {
            // not a local: reconcile jumps onto it in place
            let reg = e.info as u32;
            exp2reg(fs, e, reg)?;
            return Ok(reg);
        }
    }
    exp2nextreg(fs, e)?;
    Ok(e.info as u32)
}

/// Reduce `e` to a value (constant or register), without forcing a
/// register when there are no pending jumps.
pub(crate) fn exp2val(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    if e.has_jumps() {
        exp2anyreg(fs, e)?;
        Ok(())
    } else {
        discharge_vars(fs, e)
    }
}

/// Encode `e` as an RK operand: a constant index when it fits the RK
/// field, otherwise a register.
pub(crate) fn exp2rk(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<u32> {
    exp2val(fs, e)?;
    match e.kind {
        ExpKind::VKNum | ExpKind::VTrue | ExpKind::VFalse | ExpKind::VNil => {
            if fs.proto.k.len() <= Instruction::MAXINDEXRK as usize {
                let k = match e.kind {
                    ExpKind::VNil => nil_k(fs)?,
                    ExpKind::VKNum => number_k(fs, e.nval)?,
                    _ => bool_k(fs, e.kind == ExpKind::VTrue)?,
                };
                e.info = k as i32;
                e.kind = ExpKind::VK;
                return Ok(Instruction::rk_as_k(k));
            }
        }
        ExpKind::VK => {
            if e.info as u32 <= Instruction::MAXINDEXRK {
                return Ok(Instruction::rk_as_k(e.info as u32));
            }
        }
        _ => {}
    }
    // not a constant in the right range: put it in a register
    exp2anyreg(fs, e)
}

/// Assign the value of `ex` to the variable described by `var`.
pub(crate) fn store_var(fs: &mut FuncState, var: &ExpDesc, ex: &mut ExpDesc) -> CompileResult<()> {
    match var.kind {
        ExpKind::VLocal => {
            free_exp(fs, ex);
            return exp2reg(fs, ex, var.info as u32);
        }
        ExpKind::VUpval => {
            let e = exp2anyreg(fs, ex)?;
            code_abc(fs, OpCode::SetUpval, e, var.info as u32, 0)?;
        }
        ExpKind::VGlobal => {
            let e = exp2anyreg(fs, ex)?;
            code_abx(fs, OpCode::SetGlobal, e, var.info as u32)?;
        }
        ExpKind::VIndexed => {
            let e = exp2rk(fs, ex)?;
            code_abc(fs, OpCode::SetTable, var.info as u32, var.aux, e)?;
        }
        _ => unreachable!("store target is not a variable"),
    }
    free_exp(fs, ex);
    Ok(())
}

/// Emit SELF: `e:key` leaves the method and the receiver in two
/// consecutive registers.
pub(crate) fn code_self(fs: &mut FuncState, e: &mut ExpDesc, key: &mut ExpDesc) -> CompileResult<()> {
    exp2anyreg(fs, e)?;
    free_exp(fs, e);
    let func = fs.freereg as u32;
    reserve_regs(fs, 2)?;
    let krk = exp2rk(fs, key)?;
    code_abc(fs, OpCode::Self_, func, e.info as u32, krk)?;
    free_exp(fs, key);
    e.info = func as i32;
    e.kind = ExpKind::VNonReloc;
    Ok(())
}

/// Flip the sense of the comparison controlling a VJmp.
fn invert_jump(fs: &mut FuncState, e: &ExpDesc) {
    let pos = jump_control_pos(fs, e.info);
    let i = &mut fs.proto.code[pos];
    debug_assert!(
        Instruction::get_opcode(*i).is_test()
            && Instruction::get_opcode(*i) != OpCode::TestSet
            && Instruction::get_opcode(*i) != OpCode::Test
    );
    let a = Instruction::get_a(*i);
    Instruction::set_a(i, (a == 0) as u32);
}

/// Emit a conditional jump on the truthiness of `e`; fuses a pending NOT
/// into the test.
fn jump_on_cond(fs: &mut FuncState, e: &mut ExpDesc, cond: bool) -> CompileResult<i32> {
    if e.kind == ExpKind::VReloc {
        let ie = fs.proto.code[e.info as usize];
        if Instruction::get_opcode(ie) == OpCode::Not {
            // remove the NOT and test its operand with the opposite sense
            fs.proto.code.pop();
            fs.proto.lineinfo.pop();
            return cond_jump(fs, OpCode::Test, Instruction::get_b(ie), 0, (!cond) as u32);
        }
    }
    discharge2anyreg(fs, e)?;
    free_exp(fs, e);
    cond_jump(fs, OpCode::TestSet, NO_REG, e.info as u32, cond as u32)
}

/// Arrange for control to fall through only when `e` is truthy; false
/// exits accumulate on `e.f`.
pub(crate) fn go_if_true(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    discharge_vars(fs, e)?;
    let pc = match e.kind {
        ExpKind::VK | ExpKind::VKNum | ExpKind::VTrue => NO_JUMP, // always true
        ExpKind::VFalse => jump(fs)?,                             // always jumps
        ExpKind::VJmp => {
            invert_jump(fs, e);
            e.info
        }
        _ => jump_on_cond(fs, e, false)?,
    };
    concat_list(fs, &mut e.f, pc)?;
    let t = e.t;
    patch_to_here(fs, t)?;
    e.t = NO_JUMP;
    Ok(())
}

/// Symmetric to [`go_if_true`]: fall through only when `e` is falsy.
pub(crate) fn go_if_false(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    discharge_vars(fs, e)?;
    let pc = match e.kind {
        ExpKind::VNil | ExpKind::VFalse => NO_JUMP, // always false
        ExpKind::VTrue => jump(fs)?,                // always jumps
        ExpKind::VJmp => e.info,
        _ => jump_on_cond(fs, e, true)?,
    };
    concat_list(fs, &mut e.t, pc)?;
    let f = e.f;
    patch_to_here(fs, f)?;
    e.f = NO_JUMP;
    Ok(())
}

/// Logical negation, evaluated on descriptors where possible.
pub(crate) fn code_not(fs: &mut FuncState, e: &mut ExpDesc) -> CompileResult<()> {
    discharge_vars(fs, e)?;
    match e.kind {
        ExpKind::VNil | ExpKind::VFalse => e.kind = ExpKind::VTrue,
        ExpKind::VK | ExpKind::VKNum | ExpKind::VTrue => e.kind = ExpKind::VFalse,
        ExpKind::VJmp => invert_jump(fs, e),
        ExpKind::VReloc | ExpKind::VNonReloc => {
            discharge2anyreg(fs, e)?;
            free_exp(fs, e);
            e.info = code_abc(fs, OpCode::Not, 0, e.info as u32, 0)?;
            e.kind = ExpKind::VReloc;
        }
        _ => unreachable!("cannot negate this expression kind"),
    }
    // truth lists swap roles, and any captured values are dropped
    std::mem::swap(&mut e.t, &mut e.f);
    remove_values(fs, e.f);
    remove_values(fs, e.t);
    Ok(())
}

/// Turn `t` into a descriptor for `t[k]`; the key is RK-encoded.
pub(crate) fn indexed(fs: &mut FuncState, t: &mut ExpDesc, k: &mut ExpDesc) -> CompileResult<()> {
    t.aux = exp2rk(fs, k)?;
    t.kind = ExpKind::VIndexed;
    Ok(())
}
