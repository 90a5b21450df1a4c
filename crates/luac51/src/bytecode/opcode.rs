//! The opcode set and its operand-mode table.
//!
//! Numbering, operand modes, and the RK convention are an external contract
//! with the virtual machine and must not change.

/// Instruction format of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFormat {
    IABC,
    IABx,
    IAsBx,
}

/// What an opcode's B or C operand may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArg {
    /// Operand is unused (must be emitted as 0).
    N,
    /// Plain unsigned argument.
    U,
    /// Register or jump offset.
    R,
    /// Register or constant (RK-encoded).
    K,
}

/// Per-opcode emission rules, checked on every emission.
#[derive(Debug, Clone, Copy)]
pub struct OpMode {
    /// Instruction is a test: the VM pairs it with the following JMP.
    pub test: bool,
    /// Instruction writes register A.
    pub set_a: bool,
    pub b: OpArg,
    pub c: OpArg,
    pub format: OpFormat,
}

const fn opmode(test: bool, set_a: bool, b: OpArg, c: OpArg, format: OpFormat) -> OpMode {
    OpMode {
        test,
        set_a,
        b,
        c,
        format,
    }
}

/// Complete opcode set (38 opcodes).
///
/// `R(x)` is register x, `Kst(x)` constant x, `RK(x)` either by the RK
/// flag, `Gbl[...]` the global table, `UpValue[x]` an upvalue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,  // R(A) := R(B)
    LoadK,     // R(A) := Kst(Bx)
    LoadBool,  // R(A) := (Bool)B; if (C) pc++
    LoadNil,   // R(A) := ... := R(B) := nil
    GetUpval,  // R(A) := UpValue[B]
    GetGlobal, // R(A) := Gbl[Kst(Bx)]
    GetTable,  // R(A) := R(B)[RK(C)]
    SetGlobal, // Gbl[Kst(Bx)] := R(A)
    SetUpval,  // UpValue[B] := R(A)
    SetTable,  // R(A)[RK(B)] := RK(C)
    NewTable,  // R(A) := {} (size hints = B array, C hash)
    Self_,     // R(A+1) := R(B); R(A) := R(B)[RK(C)]
    Add,       // R(A) := RK(B) + RK(C)
    Sub,       // R(A) := RK(B) - RK(C)
    Mul,       // R(A) := RK(B) * RK(C)
    Div,       // R(A) := RK(B) / RK(C)
    Mod,       // R(A) := RK(B) % RK(C)
    Pow,       // R(A) := RK(B) ^ RK(C)
    Unm,       // R(A) := -R(B)
    Not,       // R(A) := not R(B)
    Len,       // R(A) := length of R(B)
    Concat,    // R(A) := R(B).. ... ..R(C)
    Jmp,       // pc += sBx
    Eq,        // if ((RK(B) == RK(C)) ~= A) then pc++
    Lt,        // if ((RK(B) <  RK(C)) ~= A) then pc++
    Le,        // if ((RK(B) <= RK(C)) ~= A) then pc++
    Test,      // if not (R(A) <=> C) then pc++
    TestSet,   // if (R(B) <=> C) then R(A) := R(B) else pc++
    Call,      // R(A), ... ,R(A+C-2) := R(A)(R(A+1), ... ,R(A+B-1))
    TailCall,  // return R(A)(R(A+1), ... ,R(A+B-1))
    Return,    // return R(A), ... ,R(A+B-2)
    ForLoop,   // R(A)+=R(A+2); if R(A) <?= R(A+1) then { pc+=sBx; R(A+3)=R(A) }
    ForPrep,   // R(A)-=R(A+2); pc+=sBx
    TForLoop,  // R(A+3..A+2+C) := R(A)(R(A+1), R(A+2)); if nil then pc++
    SetList,   // R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B
    Close,     // close all variables in the stack up to (>=) R(A)
    Closure,   // R(A) := closure(KPROTO[Bx], R(A), ... ,R(A+n))
    Vararg,    // R(A), R(A+1), ..., R(A+B-1) = vararg
}

pub const NUM_OPCODES: usize = OpCode::Vararg as usize + 1;

/*       T      A      B        C        mode                   opcode  */
#[rustfmt::skip]
const OPMODES: [OpMode; NUM_OPCODES] = [
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IABC),  // MOVE
    opmode(false, true,  OpArg::K, OpArg::N, OpFormat::IABx),  // LOADK
    opmode(false, true,  OpArg::U, OpArg::U, OpFormat::IABC),  // LOADBOOL
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IABC),  // LOADNIL
    opmode(false, true,  OpArg::U, OpArg::N, OpFormat::IABC),  // GETUPVAL
    opmode(false, true,  OpArg::K, OpArg::N, OpFormat::IABx),  // GETGLOBAL
    opmode(false, true,  OpArg::R, OpArg::K, OpFormat::IABC),  // GETTABLE
    opmode(false, false, OpArg::K, OpArg::N, OpFormat::IABx),  // SETGLOBAL
    opmode(false, false, OpArg::U, OpArg::N, OpFormat::IABC),  // SETUPVAL
    opmode(false, false, OpArg::K, OpArg::K, OpFormat::IABC),  // SETTABLE
    opmode(false, true,  OpArg::U, OpArg::U, OpFormat::IABC),  // NEWTABLE
    opmode(false, true,  OpArg::R, OpArg::K, OpFormat::IABC),  // SELF
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // ADD
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // SUB
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // MUL
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // DIV
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // MOD
    opmode(false, true,  OpArg::K, OpArg::K, OpFormat::IABC),  // POW
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IABC),  // UNM
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IABC),  // NOT
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IABC),  // LEN
    opmode(false, true,  OpArg::R, OpArg::R, OpFormat::IABC),  // CONCAT
    opmode(false, false, OpArg::R, OpArg::N, OpFormat::IAsBx), // JMP
    opmode(true,  false, OpArg::K, OpArg::K, OpFormat::IABC),  // EQ
    opmode(true,  false, OpArg::K, OpArg::K, OpFormat::IABC),  // LT
    opmode(true,  false, OpArg::K, OpArg::K, OpFormat::IABC),  // LE
    opmode(true,  true,  OpArg::R, OpArg::U, OpFormat::IABC),  // TEST
    opmode(true,  true,  OpArg::R, OpArg::U, OpFormat::IABC),  // TESTSET
    opmode(false, true,  OpArg::U, OpArg::U, OpFormat::IABC),  // CALL
    opmode(false, true,  OpArg::U, OpArg::U, OpFormat::IABC),  // TAILCALL
    opmode(false, false, OpArg::U, OpArg::N, OpFormat::IABC),  // RETURN
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IAsBx), // FORLOOP
    opmode(false, true,  OpArg::R, OpArg::N, OpFormat::IAsBx), // FORPREP
    opmode(true,  false, OpArg::N, OpArg::U, OpFormat::IABC),  // TFORLOOP
    opmode(false, false, OpArg::U, OpArg::U, OpFormat::IABC),  // SETLIST
    opmode(false, false, OpArg::N, OpArg::N, OpFormat::IABC),  // CLOSE
    opmode(false, true,  OpArg::U, OpArg::N, OpFormat::IABx),  // CLOSURE
    opmode(false, true,  OpArg::U, OpArg::N, OpFormat::IABC),  // VARARG
];

const NAMES: [&str; NUM_OPCODES] = [
    "MOVE", "LOADK", "LOADBOOL", "LOADNIL", "GETUPVAL", "GETGLOBAL", "GETTABLE", "SETGLOBAL",
    "SETUPVAL", "SETTABLE", "NEWTABLE", "SELF", "ADD", "SUB", "MUL", "DIV", "MOD", "POW", "UNM",
    "NOT", "LEN", "CONCAT", "JMP", "EQ", "LT", "LE", "TEST", "TESTSET", "CALL", "TAILCALL",
    "RETURN", "FORLOOP", "FORPREP", "TFORLOOP", "SETLIST", "CLOSE", "CLOSURE", "VARARG",
];

impl OpCode {
    #[inline(always)]
    pub fn from_u8(v: u8) -> OpCode {
        debug_assert!((v as usize) < NUM_OPCODES);
        // All values below NUM_OPCODES are valid discriminants.
        unsafe { std::mem::transmute(v) }
    }

    #[inline(always)]
    pub fn mode(self) -> &'static OpMode {
        &OPMODES[self as usize]
    }

    /// True for opcodes the VM pairs with a following JMP.
    #[inline(always)]
    pub fn is_test(self) -> bool {
        self.mode().test
    }

    pub fn name(self) -> &'static str {
        NAMES[self as usize]
    }
}
