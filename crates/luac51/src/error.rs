use smol_str::SmolStr;
use std::fmt;

/// Broad classification of a compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Scanner-level error (bad character, unfinished string, malformed number).
    Lexical,
    /// Token stream does not match the grammar.
    Syntax,
    /// Grammatically valid but meaningless (e.g. `...` outside a vararg function).
    Semantic,
    /// An implementation limit was exceeded (locals, upvalues, constants,
    /// jump distance, recursion depth).
    Limit,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "lexical error"),
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::Semantic => write!(f, "semantic error"),
            ErrorKind::Limit => write!(f, "limit exceeded"),
        }
    }
}

/// Rich error type carrying the error class together with the chunk name,
/// line number, and human-readable message.
///
/// Compilation either produces a root [`Proto`](crate::Proto) or signals
/// exactly one `CompileError`; there is no error recovery.
///
/// Implements `Display` and `std::error::Error`, so it composes with the
/// `?` operator in host code.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// The error class.
    pub kind: ErrorKind,
    /// Chunk name the error was raised in.
    pub source: SmolStr,
    /// Source line of the offending token or construct.
    pub line: u32,
    /// Message without the position prefix.
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(kind: ErrorKind, source: SmolStr, line: u32, message: String) -> Self {
        CompileError {
            kind,
            source,
            line,
            message,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.source, self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Result alias used throughout the compiler.
pub type CompileResult<T> = Result<T, CompileError>;
