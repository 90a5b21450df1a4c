//! The compiler: a single-pass recursive-descent parser that emits
//! register-based bytecode directly. There is no syntax tree; expression
//! state is carried in [`ExpDesc`](expdesc::ExpDesc) descriptors so that
//! instruction selection can be deferred until the context is known.

mod binop;
mod code;
mod exp2reg;
mod expdesc;
mod expr;
mod func_state;
mod lexer;
mod stmt;
mod var;

pub use lexer::{Lexer, Token, TokenKind, TokenValue};

use crate::bytecode::Proto;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::interner::StringInterner;
use crate::limits::MAXCCALLS;
use func_state::FuncState;
use smol_str::SmolStr;

/// Parser state: the token stream plus the stack of functions under
/// compilation (innermost last). Upvalue resolution walks this stack
/// outward.
pub(crate) struct Parser<'s> {
    pub lex: Lexer<'s>,
    pub funcs: Vec<FuncState>,
    /// Recursion depth of the grammar, bounded by `MAXCCALLS`.
    nccalls: usize,
}

impl<'s> Parser<'s> {
    /// The function currently being compiled.
    #[inline(always)]
    pub fn fs(&mut self) -> &mut FuncState {
        self.funcs.last_mut().unwrap()
    }

    #[inline(always)]
    pub fn fs_ref(&self) -> &FuncState {
        self.funcs.last().unwrap()
    }

    /// Advance the token stream.
    pub fn next(&mut self) -> CompileResult<()> {
        self.lex.next_token()?;
        let line = self.lex.lastline;
        if let Some(fs) = self.funcs.last_mut() {
            fs.lastline = line;
        }
        Ok(())
    }

    pub fn syntax_error(&self, msg: &str) -> CompileError {
        self.error_near(ErrorKind::Syntax, msg)
    }

    pub fn semantic_error(&self, msg: &str) -> CompileError {
        self.error_near(ErrorKind::Semantic, msg)
    }

    fn error_near(&self, kind: ErrorKind, msg: &str) -> CompileError {
        CompileError::new(
            kind,
            self.lex.source.clone(),
            self.lex.linenumber,
            format!("{} near '{}'", msg, self.lex.t.describe()),
        )
    }

    pub fn error_expected(&self, kind: TokenKind) -> CompileError {
        self.syntax_error(&format!("'{}' expected", kind.describe()))
    }

    pub fn check(&self, kind: TokenKind) -> CompileResult<()> {
        if self.lex.t.kind != kind {
            return Err(self.error_expected(kind));
        }
        Ok(())
    }

    pub fn check_next(&mut self, kind: TokenKind) -> CompileResult<()> {
        self.check(kind)?;
        self.next()
    }

    pub fn test_next(&mut self, kind: TokenKind) -> CompileResult<bool> {
        if self.lex.t.kind == kind {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Expect `what`, naming the construct it closes when it opened on an
    /// earlier line.
    pub fn check_match(&mut self, what: TokenKind, who: TokenKind, line: u32) -> CompileResult<()> {
        if !self.test_next(what)? {
            if line == self.lex.linenumber {
                return Err(self.error_expected(what));
            }
            return Err(self.syntax_error(&format!(
                "'{}' expected (to close '{}' at line {})",
                what.describe(),
                who.describe(),
                line
            )));
        }
        Ok(())
    }

    /// Expect and consume a name token.
    pub fn check_name(&mut self) -> CompileResult<SmolStr> {
        match (&self.lex.t.kind, &self.lex.t.value) {
            (TokenKind::TkName, TokenValue::Name(n)) => {
                let name = n.clone();
                self.next()?;
                Ok(name)
            }
            _ => Err(self.error_expected(TokenKind::TkName)),
        }
    }

    pub fn enter_level(&mut self) -> CompileResult<()> {
        self.nccalls += 1;
        if self.nccalls > MAXCCALLS {
            return Err(CompileError::new(
                ErrorKind::Limit,
                self.lex.source.clone(),
                self.lex.linenumber,
                "chunk has too many syntax levels".to_string(),
            ));
        }
        Ok(())
    }

    pub fn leave_level(&mut self) {
        self.nccalls -= 1;
    }

    pub fn nccalls(&self) -> usize {
        self.nccalls
    }

    /// Start compiling a nested function body.
    pub fn open_func(&mut self, linedefined: u32) {
        let mut fs = FuncState::new(self.lex.source.clone(), linedefined);
        fs.lastline = self.lex.linenumber;
        self.funcs.push(fs);
    }

    /// Finish the current function: close the scope of any remaining
    /// locals, emit the implicit final return, and pop the state.
    pub fn close_func(&mut self) -> CompileResult<FuncState> {
        var::remove_vars(self, 0);
        {
            let fs = self.fs();
            code::ret(fs, 0, 0)?;
            debug_assert!(fs.blocks.is_empty());
        }
        let mut fs = self.funcs.pop().unwrap();
        fs.proto.shrink();
        let line = self.lex.lastline;
        if let Some(outer) = self.funcs.last_mut() {
            outer.lastline = line;
        }
        Ok(fs)
    }
}

/// Compile `source_text` into a root [`Proto`], interning strings through
/// the provided interner.
pub fn compile_with(
    strings: &mut StringInterner,
    source_text: &str,
    chunk_name: &str,
) -> CompileResult<Proto> {
    let lex = Lexer::new(source_text, chunk_name, strings);
    let mut p = Parser {
        lex,
        funcs: Vec::new(),
        nccalls: 0,
    };
    p.open_func(0);
    // the main chunk is always a vararg function
    p.fs().proto.is_vararg = true;
    p.next()?;
    stmt::chunk(&mut p)?;
    p.check(TokenKind::TkEof)?;
    let fs = p.close_func()?;
    debug_assert!(p.funcs.is_empty());
    Ok(fs.proto)
}
