//! Instruction emission, register accounting, constant interning, and the
//! jump-list engine.
//!
//! Pending jumps are threaded through the sBx field of the jump
//! instructions themselves: an unpatched jump's sBx holds the offset to the
//! next list node, or `NO_JUMP` at the list end.

use super::expdesc::{ExpDesc, ExpKind};
use super::func_state::{ConstKey, FuncState};
use crate::bytecode::{Instruction, OpArg, OpCode, OpFormat};
use crate::error::{CompileResult, ErrorKind};
use crate::interner::LuaStr;
use crate::limits::{FIELDS_PER_FLUSH, MAXSTACK, MULTRET, NO_JUMP, NO_REG};
use crate::value::Value;

/// Append one instruction, resolving any jumps that were waiting for it.
pub(crate) fn code(fs: &mut FuncState, i: u32) -> CompileResult<i32> {
    discharge_jpc(fs)?;
    let pc = fs.pc();
    fs.proto.code.push(i);
    let line = fs.lastline;
    fs.proto.lineinfo.push(line);
    Ok(pc)
}

pub(crate) fn code_abc(fs: &mut FuncState, op: OpCode, a: u32, b: u32, c: u32) -> CompileResult<i32> {
    let mode = op.mode();
    debug_assert_eq!(mode.format, OpFormat::IABC);
    debug_assert!(mode.b != OpArg::N || b == 0);
    debug_assert!(mode.c != OpArg::N || c == 0);
    code(fs, Instruction::create_abc(op, a, b, c))
}

pub(crate) fn code_abx(fs: &mut FuncState, op: OpCode, a: u32, bx: u32) -> CompileResult<i32> {
    let mode = op.mode();
    debug_assert!(mode.format == OpFormat::IABx || mode.format == OpFormat::IAsBx);
    debug_assert_eq!(mode.c, OpArg::N);
    code(fs, Instruction::create_abx(op, a, bx))
}

pub(crate) fn code_asbx(fs: &mut FuncState, op: OpCode, a: u32, sbx: i32) -> CompileResult<i32> {
    code_abx(fs, op, a, (sbx + Instruction::MAXARG_SBX) as u32)
}

/// Re-stamp the line of the last emitted instruction.
pub(crate) fn fix_line(fs: &mut FuncState, line: u32) {
    if let Some(slot) = fs.proto.lineinfo.last_mut() {
        *slot = line;
    }
}

/// Load nil into `from .. from+n-1`, merging with a previous LOADNIL when
/// possible. At the very start of a function fresh registers are already
/// nil, so the load can be dropped entirely.
pub(crate) fn nil(fs: &mut FuncState, from: u32, n: u32) -> CompileResult<()> {
    if fs.pc() > fs.lasttarget {
        // no jumps to the current position
        if fs.pc() == 0 {
            if from >= fs.nactvar as u32 {
                return Ok(());
            }
        } else if let Some(previous) = fs.proto.code.last_mut() {
            if Instruction::get_opcode(*previous) == OpCode::LoadNil {
                let pfrom = Instruction::get_a(*previous);
                let pto = Instruction::get_b(*previous);
                if pfrom <= from && from <= pto + 1 {
                    // ranges connect
                    if from + n - 1 > pto {
                        Instruction::set_b(previous, from + n - 1);
                    }
                    return Ok(());
                }
            }
        }
    }
    code_abc(fs, OpCode::LoadNil, from, from + n - 1, 0)?;
    Ok(())
}

/// Emit a RETURN of `nret` values starting at `first` (MULTRET for "all").
pub(crate) fn ret(fs: &mut FuncState, first: u32, nret: i32) -> CompileResult<()> {
    code_abc(fs, OpCode::Return, first, (nret + 1) as u32, 0)?;
    Ok(())
}

/// Emit an unconditional forward jump and return it as a one-element jump
/// list, absorbing any jumps that were pending to this position.
pub(crate) fn jump(fs: &mut FuncState) -> CompileResult<i32> {
    let save_jpc = fs.jpc;
    fs.jpc = NO_JUMP;
    let mut j = code_asbx(fs, OpCode::Jmp, 0, NO_JUMP)?;
    concat_list(fs, &mut j, save_jpc)?;
    Ok(j)
}

/// Emit a test instruction followed by its paired jump; returns the jump pc.
pub(crate) fn cond_jump(
    fs: &mut FuncState,
    op: OpCode,
    a: u32,
    b: u32,
    c: u32,
) -> CompileResult<i32> {
    code_abc(fs, op, a, b, c)?;
    jump(fs)
}

/// Point the jump at `pc` to `dest`.
pub(crate) fn fix_jump(fs: &mut FuncState, pc: i32, dest: i32) -> CompileResult<()> {
    debug_assert!(dest != NO_JUMP);
    let offset = dest - (pc + 1);
    if offset.abs() > Instruction::MAXARG_SBX {
        return Err(fs.error(ErrorKind::Limit, "control structure too long"));
    }
    Instruction::set_sbx(&mut fs.proto.code[pc as usize], offset);
    Ok(())
}

/// Mark the current position as a jump target, suppressing peephole
/// optimizations across it.
pub(crate) fn get_label(fs: &mut FuncState) -> i32 {
    fs.lasttarget = fs.pc();
    fs.pc()
}

/// Next node of the jump list that `pc` belongs to.
pub(crate) fn get_jump(fs: &FuncState, pc: i32) -> i32 {
    let offset = Instruction::get_sbx(fs.proto.code[pc as usize]);
    if offset == NO_JUMP {
        // a jump to itself ends the list
        NO_JUMP
    } else {
        pc + 1 + offset
    }
}

/// Position of the instruction controlling the jump at `pc`: the preceding
/// test instruction if there is one, else the jump itself.
pub(crate) fn jump_control_pos(fs: &FuncState, pc: i32) -> usize {
    let pc = pc as usize;
    if pc >= 1 && Instruction::get_opcode(fs.proto.code[pc - 1]).is_test() {
        pc - 1
    } else {
        pc
    }
}

/// True if the list contains a jump whose value is not captured by a
/// TESTSET (so materializing the expression needs LOADBOOL labels).
pub(crate) fn need_value(fs: &FuncState, mut list: i32) -> bool {
    while list != NO_JUMP {
        let i = fs.proto.code[jump_control_pos(fs, list)];
        if Instruction::get_opcode(i) != OpCode::TestSet {
            return true;
        }
        list = get_jump(fs, list);
    }
    false
}

/// Give the TESTSET controlling `node` its destination register, or demote
/// it to a plain TEST when no register is wanted (or it already holds the
/// value). Returns false if the node is not a TESTSET.
pub(crate) fn patch_test_reg(fs: &mut FuncState, node: i32, reg: u32) -> bool {
    let pos = jump_control_pos(fs, node);
    let i = fs.proto.code[pos];
    if Instruction::get_opcode(i) != OpCode::TestSet {
        return false;
    }
    if reg != NO_REG && reg != Instruction::get_b(i) {
        Instruction::set_a(&mut fs.proto.code[pos], reg);
    } else {
        fs.proto.code[pos] =
            Instruction::create_abc(OpCode::Test, Instruction::get_b(i), 0, Instruction::get_c(i));
    }
    true
}

/// Drop the produced values of all TESTSETs in the list.
pub(crate) fn remove_values(fs: &mut FuncState, mut list: i32) {
    while list != NO_JUMP {
        patch_test_reg(fs, list, NO_REG);
        list = get_jump(fs, list);
    }
}

/// Patch every node of `list`: value-producing nodes (TESTSET) jump to
/// `vtarget` with destination `reg`; the rest jump to `dtarget`.
pub(crate) fn patch_list_aux(
    fs: &mut FuncState,
    mut list: i32,
    vtarget: i32,
    reg: u32,
    dtarget: i32,
) -> CompileResult<()> {
    while list != NO_JUMP {
        let next = get_jump(fs, list);
        if patch_test_reg(fs, list, reg) {
            fix_jump(fs, list, vtarget)?;
        } else {
            fix_jump(fs, list, dtarget)?;
        }
        list = next;
    }
    Ok(())
}

/// Resolve all jumps pending on the next instruction to the current pc.
fn discharge_jpc(fs: &mut FuncState) -> CompileResult<()> {
    let pc = fs.pc();
    let jpc = fs.jpc;
    fs.jpc = NO_JUMP;
    patch_list_aux(fs, jpc, pc, NO_REG, pc)
}

/// Patch `list` to jump to `target`, which must already be emitted.
pub(crate) fn patch_list(fs: &mut FuncState, list: i32, target: i32) -> CompileResult<()> {
    if target == fs.pc() {
        patch_to_here(fs, list)
    } else {
        debug_assert!(target < fs.pc());
        patch_list_aux(fs, list, target, NO_REG, target)
    }
}

/// Patch `list` to jump to the next instruction to be emitted.
pub(crate) fn patch_to_here(fs: &mut FuncState, list: i32) -> CompileResult<()> {
    get_label(fs);
    let mut jpc = fs.jpc;
    concat_list(fs, &mut jpc, list)?;
    fs.jpc = jpc;
    Ok(())
}

/// Append list `l2` onto the tail of `l1`.
pub(crate) fn concat_list(fs: &mut FuncState, l1: &mut i32, l2: i32) -> CompileResult<()> {
    if l2 == NO_JUMP {
        return Ok(());
    }
    if *l1 == NO_JUMP {
        *l1 = l2;
        return Ok(());
    }
    let mut list = *l1;
    loop {
        let next = get_jump(fs, list);
        if next == NO_JUMP {
            break;
        }
        list = next;
    }
    fix_jump(fs, list, l2)
}

/// Ensure `n` more registers fit in this frame.
pub(crate) fn check_stack(fs: &mut FuncState, n: u32) -> CompileResult<()> {
    let newstack = fs.freereg as usize + n as usize;
    if newstack > fs.proto.maxstacksize as usize {
        if newstack >= MAXSTACK {
            return Err(fs.error(ErrorKind::Limit, "function or expression too complex"));
        }
        fs.proto.maxstacksize = newstack as u8;
    }
    Ok(())
}

pub(crate) fn reserve_regs(fs: &mut FuncState, n: u32) -> CompileResult<()> {
    check_stack(fs, n)?;
    fs.freereg += n as u8;
    Ok(())
}

/// Release a temporary register. Named locals are never freed here; they
/// die on scope exit.
pub(crate) fn free_reg(fs: &mut FuncState, reg: u32) {
    if !Instruction::is_k(reg) && reg >= fs.nactvar as u32 {
        fs.freereg -= 1;
        debug_assert_eq!(reg, fs.freereg as u32);
    }
}

pub(crate) fn free_exp(fs: &mut FuncState, e: &ExpDesc) {
    if e.kind == ExpKind::VNonReloc {
        free_reg(fs, e.info as u32);
    }
}

/// Intern a constant, reusing the index of an equal value already in the
/// pool.
pub(crate) fn add_k(fs: &mut FuncState, key: ConstKey, v: Value) -> CompileResult<u32> {
    if let Some(&idx) = fs.const_map.get(&key) {
        return Ok(idx);
    }
    fs.check_limit(
        fs.proto.k.len() + 1,
        Instruction::MAXARG_BX as usize,
        "constants",
    )?;
    let idx = fs.proto.k.len() as u32;
    fs.proto.k.push(v);
    fs.const_map.insert(key, idx);
    Ok(idx)
}

pub(crate) fn string_k(fs: &mut FuncState, s: LuaStr) -> CompileResult<u32> {
    add_k(fs, ConstKey::Str(s.clone()), Value::Str(s))
}

pub(crate) fn number_k(fs: &mut FuncState, n: f64) -> CompileResult<u32> {
    add_k(fs, ConstKey::number(n), Value::Number(n))
}

pub(crate) fn bool_k(fs: &mut FuncState, b: bool) -> CompileResult<u32> {
    add_k(fs, ConstKey::Bool(b), Value::Bool(b))
}

pub(crate) fn nil_k(fs: &mut FuncState) -> CompileResult<u32> {
    add_k(fs, ConstKey::Nil, Value::Nil)
}

/// Fix an open call or vararg to produce `nresults` values.
pub(crate) fn set_returns(fs: &mut FuncState, e: &ExpDesc, nresults: i32) -> CompileResult<()> {
    if e.kind == ExpKind::VCall {
        let i = &mut fs.proto.code[e.info as usize];
        Instruction::set_c(i, (nresults + 1) as u32);
    } else if e.kind == ExpKind::VVararg {
        let freereg = fs.freereg as u32;
        let i = &mut fs.proto.code[e.info as usize];
        Instruction::set_b(i, (nresults + 1) as u32);
        Instruction::set_a(i, freereg);
        reserve_regs(fs, 1)?;
    }
    Ok(())
}

pub(crate) fn set_mult_ret(fs: &mut FuncState, e: &ExpDesc) -> CompileResult<()> {
    set_returns(fs, e, MULTRET)
}

/// Fix an open call or vararg to produce exactly one value.
pub(crate) fn set_one_ret(fs: &mut FuncState, e: &mut ExpDesc) {
    if e.kind == ExpKind::VCall {
        e.kind = ExpKind::VNonReloc;
        e.info = Instruction::get_a(fs.proto.code[e.info as usize]) as i32;
    } else if e.kind == ExpKind::VVararg {
        Instruction::set_b(&mut fs.proto.code[e.info as usize], 2);
        // its sole result can go anywhere
        e.kind = ExpKind::VReloc;
    }
}

/// Flush a batch of `tostore` array items (`MULTRET` for an open tail) for
/// the table at `base`; `nelems` counts items flushed so far including
/// these.
pub(crate) fn set_list(fs: &mut FuncState, base: u32, nelems: u32, tostore: i32) -> CompileResult<()> {
    let c = (nelems - 1) / FIELDS_PER_FLUSH + 1;
    let b = if tostore == MULTRET { 0 } else { tostore as u32 };
    debug_assert!(tostore != 0);
    if c <= Instruction::MAXARG_C {
        code_abc(fs, OpCode::SetList, base, b, c)?;
    } else {
        // batch number goes in a raw extra word after the instruction
        code_abc(fs, OpCode::SetList, base, b, 0)?;
        code(fs, c)?;
    }
    // the list values are consumed
    fs.freereg = (base + 1) as u8;
    Ok(())
}

/// Compress a size hint into Lua's "floating point byte" format
/// (eeeeexxx: (1xxx) * 2^(eeeee-1), or plain xxx when eeeee is 0).
pub(crate) fn int2fb(mut x: u32) -> u32 {
    let mut e = 0;
    while x >= 16 {
        x = (x + 1) >> 1;
        e += 1;
    }
    if x < 8 { x } else { ((e + 1) << 3) | (x - 8) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int2fb_small_values_are_exact() {
        for x in 0..8 {
            assert_eq!(int2fb(x), x);
        }
    }

    #[test]
    fn int2fb_rounds_up() {
        // 1xxx * 2^(eeeee-1) must be >= the original value
        for x in [8u32, 15, 16, 17, 100, 1000, 65535] {
            let fb = int2fb(x);
            let e = fb >> 3;
            let m = fb & 7;
            let decoded = if e == 0 { m } else { (m + 8) << (e - 1) };
            assert!(decoded >= x, "x={} decoded={}", x, decoded);
        }
    }
}
