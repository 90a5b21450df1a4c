//! Operators: precedence, constant folding, and lowering to instructions.

use super::code::*;
use super::exp2reg::*;
use super::expdesc::{ExpDesc, ExpKind};
use super::func_state::FuncState;
use super::lexer::TokenKind;
use crate::bytecode::{Instruction, OpCode};
use crate::error::CompileResult;
use crate::limits::NO_JUMP;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnOp {
    Minus,
    Not,
    Len,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Ne,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

pub(crate) fn get_unop(kind: TokenKind) -> Option<UnOp> {
    match kind {
        TokenKind::TkMinus => Some(UnOp::Minus),
        TokenKind::TkNot => Some(UnOp::Not),
        TokenKind::TkLen => Some(UnOp::Len),
        _ => None,
    }
}

pub(crate) fn get_binop(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::TkPlus => Some(BinOp::Add),
        TokenKind::TkMinus => Some(BinOp::Sub),
        TokenKind::TkMul => Some(BinOp::Mul),
        TokenKind::TkDiv => Some(BinOp::Div),
        TokenKind::TkMod => Some(BinOp::Mod),
        TokenKind::TkPow => Some(BinOp::Pow),
        TokenKind::TkConcat => Some(BinOp::Concat),
        TokenKind::TkNe => Some(BinOp::Ne),
        TokenKind::TkEq => Some(BinOp::Eq),
        TokenKind::TkLt => Some(BinOp::Lt),
        TokenKind::TkLe => Some(BinOp::Le),
        TokenKind::TkGt => Some(BinOp::Gt),
        TokenKind::TkGe => Some(BinOp::Ge),
        TokenKind::TkAnd => Some(BinOp::And),
        TokenKind::TkOr => Some(BinOp::Or),
        _ => None,
    }
}

/// `(left, right)` binding powers. `right < left` makes an operator
/// right-associative.
pub(crate) fn priority(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 1),
        BinOp::And => (2, 2),
        BinOp::Ne | BinOp::Eq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (3, 3),
        BinOp::Concat => (5, 4), // right associative
        BinOp::Add | BinOp::Sub => (6, 6),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (7, 7),
        BinOp::Pow => (10, 9), // right associative
    }
}

/// Binding power of unary operators.
pub(crate) const UNARY_PRIORITY: u8 = 8;

/// Evaluate an arithmetic operator over two numeric literals at compile
/// time. Division/modulo by zero and NaN results fall through to a runtime
/// instruction.
fn const_fold(op: OpCode, e1: &mut ExpDesc, e2: &ExpDesc) -> bool {
    if !e1.is_numeral() || !e2.is_numeral() {
        return false;
    }
    let v1 = e1.nval;
    let v2 = e2.nval;
    let r = match op {
        OpCode::Add => v1 + v2,
        OpCode::Sub => v1 - v2,
        OpCode::Mul => v1 * v2,
        OpCode::Div => {
            if v2 == 0.0 {
                return false;
            }
            v1 / v2
        }
        OpCode::Mod => {
            if v2 == 0.0 {
                return false;
            }
            v1 - (v1 / v2).floor() * v2
        }
        OpCode::Pow => v1.powf(v2),
        OpCode::Unm => -v1,
        OpCode::Len => return false, // no constant length
        _ => unreachable!("not a foldable operator"),
    };
    if r.is_nan() {
        return false;
    }
    e1.nval = r;
    true
}

/// Lower an arithmetic operation: fold if possible, otherwise RK-convert
/// the operands, release their temporaries, and emit with an open
/// destination.
pub(crate) fn code_arith(
    fs: &mut FuncState,
    op: OpCode,
    e1: &mut ExpDesc,
    e2: &mut ExpDesc,
) -> CompileResult<()> {
    if const_fold(op, e1, e2) {
        return Ok(());
    }
    let o2 = if op != OpCode::Unm && op != OpCode::Len {
        exp2rk(fs, e2)?
    } else {
        0
    };
    let o1 = exp2rk(fs, e1)?;
    if o1 > o2 {
        free_exp(fs, e1);
        free_exp(fs, e2);
    } else {
        free_exp(fs, e2);
        free_exp(fs, e1);
    }
    e1.info = code_abc(fs, op, 0, o1, o2)?;
    e1.kind = ExpKind::VReloc;
    Ok(())
}

/// Lower a comparison. The VM encodes comparisons as a conditional skip,
/// so the result is the pc of the paired jump; `>` and `>=` become `<` and
/// `<=` with swapped operands.
fn code_comp(
    fs: &mut FuncState,
    op: OpCode,
    cond: bool,
    e1: &mut ExpDesc,
    e2: &mut ExpDesc,
) -> CompileResult<()> {
    let mut o1 = exp2rk(fs, e1)?;
    let mut o2 = exp2rk(fs, e2)?;
    free_exp(fs, e2);
    free_exp(fs, e1);
    let mut cond = cond as u32;
    if cond == 0 && op != OpCode::Eq {
        std::mem::swap(&mut o1, &mut o2);
        cond = 1;
    }
    e1.info = cond_jump(fs, op, cond, o1, o2)?;
    e1.kind = ExpKind::VJmp;
    Ok(())
}

/// Apply a unary operator to `e`.
pub(crate) fn prefix(fs: &mut FuncState, op: UnOp, e: &mut ExpDesc) -> CompileResult<()> {
    let mut fake = ExpDesc::number(0.0);
    match op {
        UnOp::Minus => {
            if !e.is_numeral() {
                // cannot operate on non-numeric constants
                exp2anyreg(fs, e)?;
            }
            code_arith(fs, OpCode::Unm, e, &mut fake)
        }
        UnOp::Not => code_not(fs, e),
        UnOp::Len => {
            // no constant length: operand always goes to a register
            exp2anyreg(fs, e)?;
            code_arith(fs, OpCode::Len, e, &mut fake)
        }
    }
}

/// Prepare the left operand before the right one is parsed.
pub(crate) fn infix(fs: &mut FuncState, op: BinOp, v: &mut ExpDesc) -> CompileResult<()> {
    match op {
        BinOp::And => go_if_true(fs, v),
        BinOp::Or => go_if_false(fs, v),
        BinOp::Concat => exp2nextreg(fs, v),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
            if !v.is_numeral() {
                exp2rk(fs, v)?;
            }
            Ok(())
        }
        _ => {
            exp2rk(fs, v)?;
            Ok(())
        }
    }
}

/// Combine both operands once the right one is parsed.
pub(crate) fn posfix(
    fs: &mut FuncState,
    op: BinOp,
    e1: &mut ExpDesc,
    e2: &mut ExpDesc,
) -> CompileResult<()> {
    match op {
        BinOp::And => {
            debug_assert_eq!(e1.t, NO_JUMP); // closed by infix
            discharge_vars(fs, e2)?;
            concat_list(fs, &mut e2.f, e1.f)?;
            *e1 = *e2;
            Ok(())
        }
        BinOp::Or => {
            debug_assert_eq!(e1.f, NO_JUMP); // closed by infix
            discharge_vars(fs, e2)?;
            concat_list(fs, &mut e2.t, e1.t)?;
            *e1 = *e2;
            Ok(())
        }
        BinOp::Concat => {
            exp2val(fs, e2)?;
            let chains = e2.kind == ExpKind::VReloc
                && Instruction::get_opcode(fs.proto.code[e2.info as usize]) == OpCode::Concat;
            if chains {
                // grow the pending CONCAT downward over e1's register
                debug_assert_eq!(
                    e1.info as u32,
                    Instruction::get_b(fs.proto.code[e2.info as usize]) - 1
                );
                free_exp(fs, e1);
                Instruction::set_b(&mut fs.proto.code[e2.info as usize], e1.info as u32);
                e1.kind = ExpKind::VReloc;
                e1.info = e2.info;
                Ok(())
            } else {
                // operand must be on the stack
                exp2nextreg(fs, e2)?;
                code_arith(fs, OpCode::Concat, e1, e2)
            }
        }
        BinOp::Add => code_arith(fs, OpCode::Add, e1, e2),
        BinOp::Sub => code_arith(fs, OpCode::Sub, e1, e2),
        BinOp::Mul => code_arith(fs, OpCode::Mul, e1, e2),
        BinOp::Div => code_arith(fs, OpCode::Div, e1, e2),
        BinOp::Mod => code_arith(fs, OpCode::Mod, e1, e2),
        BinOp::Pow => code_arith(fs, OpCode::Pow, e1, e2),
        BinOp::Eq => code_comp(fs, OpCode::Eq, true, e1, e2),
        BinOp::Ne => code_comp(fs, OpCode::Eq, false, e1, e2),
        BinOp::Lt => code_comp(fs, OpCode::Lt, true, e1, e2),
        BinOp::Le => code_comp(fs, OpCode::Le, true, e1, e2),
        BinOp::Gt => code_comp(fs, OpCode::Lt, false, e1, e2),
        BinOp::Ge => code_comp(fs, OpCode::Le, false, e1, e2),
    }
}
