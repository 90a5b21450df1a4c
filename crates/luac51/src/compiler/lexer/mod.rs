//! The scanner: pulls one token at a time from source text, with a single
//! token of lookahead.

mod reader;
mod token;

pub use token::{Token, TokenKind, TokenValue, name_to_kind};

use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::interner::{LuaStr, StringInterner};
use reader::{EOZ, Reader};
use smol_str::SmolStr;

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_cont(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

enum LongBracket {
    Open(usize),
    Plain,
    Invalid(String),
}

pub struct Lexer<'s> {
    rd: Reader<'s>,
    pub strings: &'s mut StringInterner,
    /// Chunk name, used verbatim in error messages.
    pub source: SmolStr,
    /// Current token.
    pub t: Token,
    /// One-token lookahead, if requested.
    ahead: Option<Token>,
    /// Line of the scanner position (line of the current token once scanned).
    pub linenumber: u32,
    /// Line of the previous token.
    pub lastline: u32,
    /// Scratch buffer for string literals with escapes.
    buf: String,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str, chunk_name: &str, strings: &'s mut StringInterner) -> Self {
        Lexer {
            rd: Reader::new(src),
            strings,
            source: SmolStr::new(chunk_name),
            t: Token::simple(TokenKind::TkEof),
            ahead: None,
            linenumber: 1,
            lastline: 1,
            buf: String::new(),
        }
    }

    /// Consume the current token and scan the next one.
    pub fn next_token(&mut self) -> CompileResult<()> {
        self.lastline = self.linenumber;
        self.t = match self.ahead.take() {
            Some(tok) => tok,
            None => self.scan()?,
        };
        Ok(())
    }

    /// Peek one token ahead without consuming the current one.
    pub fn lookahead(&mut self) -> CompileResult<&Token> {
        if self.ahead.is_none() {
            let tok = self.scan()?;
            self.ahead = Some(tok);
        }
        Ok(self.ahead.as_ref().unwrap())
    }

    pub fn error(&self, msg: &str, near: &str) -> CompileError {
        CompileError::new(
            ErrorKind::Lexical,
            self.source.clone(),
            self.linenumber,
            format!("{} near '{}'", msg, near),
        )
    }

    fn current_is_newline(&self) -> bool {
        matches!(self.rd.current(), b'\n' | b'\r')
    }

    /// Skip a newline, treating `\n\r` and `\r\n` as a single line break.
    fn inc_line(&mut self) {
        let old = self.rd.current();
        self.rd.bump();
        if self.current_is_newline() && self.rd.current() != old {
            self.rd.bump();
        }
        self.linenumber += 1;
    }

    fn scan(&mut self) -> CompileResult<Token> {
        loop {
            match self.rd.current() {
                b'\n' | b'\r' => self.inc_line(),
                b' ' | b'\t' | 0x0b | 0x0c => self.rd.bump(),
                b'-' => {
                    if self.rd.peek_next() != b'-' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkMinus));
                    }
                    self.rd.bump();
                    self.rd.bump();
                    // long comment?
                    if self.rd.current() == b'[' {
                        if let LongBracket::Open(level) = self.try_long_bracket() {
                            self.read_long_string(level, true)?;
                            continue;
                        }
                    }
                    // short comment runs to end of line
                    self.rd.eat_while(|c| c != b'\n' && c != b'\r');
                }
                b'[' => {
                    return match self.try_long_bracket() {
                        LongBracket::Open(level) => {
                            let s = self.read_long_string(level, false)?;
                            Ok(Token {
                                kind: TokenKind::TkString,
                                value: TokenValue::Str(s),
                            })
                        }
                        LongBracket::Plain => Ok(Token::simple(TokenKind::TkLeftBracket)),
                        LongBracket::Invalid(near) => {
                            Err(self.error("invalid long string delimiter", &near))
                        }
                    };
                }
                b'=' => {
                    self.rd.bump();
                    if self.rd.current() == b'=' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkEq));
                    }
                    return Ok(Token::simple(TokenKind::TkAssign));
                }
                b'<' => {
                    self.rd.bump();
                    if self.rd.current() == b'=' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkLe));
                    }
                    return Ok(Token::simple(TokenKind::TkLt));
                }
                b'>' => {
                    self.rd.bump();
                    if self.rd.current() == b'=' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkGe));
                    }
                    return Ok(Token::simple(TokenKind::TkGt));
                }
                b'~' => {
                    self.rd.bump();
                    if self.rd.current() == b'=' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkNe));
                    }
                    return Err(self.error("unexpected symbol", "~"));
                }
                b':' => {
                    self.rd.bump();
                    if self.rd.current() == b':' {
                        self.rd.bump();
                        return Ok(Token::simple(TokenKind::TkDbColon));
                    }
                    return Ok(Token::simple(TokenKind::TkColon));
                }
                b'"' | b'\'' => {
                    let s = self.read_string(self.rd.current())?;
                    return Ok(Token {
                        kind: TokenKind::TkString,
                        value: TokenValue::Str(s),
                    });
                }
                b'.' => {
                    if is_digit(self.rd.peek_next()) {
                        return self.read_numeral();
                    }
                    self.rd.bump();
                    if self.rd.current() != b'.' {
                        return Ok(Token::simple(TokenKind::TkDot));
                    }
                    self.rd.bump();
                    if self.rd.current() != b'.' {
                        return Ok(Token::simple(TokenKind::TkConcat));
                    }
                    self.rd.bump();
                    return Ok(Token::simple(TokenKind::TkDots));
                }
                c if is_digit(c) => return self.read_numeral(),
                c if is_name_start(c) => {
                    let start = self.rd.pos();
                    self.rd.eat_while(is_name_cont);
                    let text = self.rd.slice(start, self.rd.pos());
                    let kind = name_to_kind(text);
                    return Ok(if kind == TokenKind::TkName {
                        Token {
                            kind,
                            value: TokenValue::Name(SmolStr::new(text)),
                        }
                    } else {
                        Token::simple(kind)
                    });
                }
                b'+' => return self.single(TokenKind::TkPlus),
                b'*' => return self.single(TokenKind::TkMul),
                b'/' => return self.single(TokenKind::TkDiv),
                b'%' => return self.single(TokenKind::TkMod),
                b'^' => return self.single(TokenKind::TkPow),
                b'#' => return self.single(TokenKind::TkLen),
                b'(' => return self.single(TokenKind::TkLeftParen),
                b')' => return self.single(TokenKind::TkRightParen),
                b'{' => return self.single(TokenKind::TkLeftBrace),
                b'}' => return self.single(TokenKind::TkRightBrace),
                b']' => return self.single(TokenKind::TkRightBracket),
                b';' => return self.single(TokenKind::TkSemicolon),
                b',' => return self.single(TokenKind::TkComma),
                EOZ if self.rd.is_eof() => return Ok(Token::simple(TokenKind::TkEof)),
                c => {
                    return Err(self.error("unexpected symbol", &(c as char).to_string()));
                }
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> CompileResult<Token> {
        self.rd.bump();
        Ok(Token::simple(kind))
    }

    /// At a `[`: consume a long-bracket opener `[=*[`, a plain `[`, or a
    /// malformed `[=*` run. Only the string context treats the last one as
    /// an error; comments fall back to a line comment.
    fn try_long_bracket(&mut self) -> LongBracket {
        debug_assert_eq!(self.rd.current(), b'[');
        let start = self.rd.pos();
        self.rd.bump();
        let mut level = 0usize;
        while self.rd.current() == b'=' {
            level += 1;
            self.rd.bump();
        }
        if self.rd.current() == b'[' {
            self.rd.bump();
            return LongBracket::Open(level);
        }
        if level == 0 {
            // plain '[' already consumed
            return LongBracket::Plain;
        }
        LongBracket::Invalid(self.rd.slice(start, self.rd.pos()).to_string())
    }

    /// Body of a long string or comment; the opener was just consumed.
    fn read_long_string(&mut self, level: usize, is_comment: bool) -> CompileResult<LuaStr> {
        // a newline right after the opener is not part of the content
        if self.current_is_newline() {
            self.inc_line();
        }
        let start = self.rd.pos();
        loop {
            match self.rd.current() {
                EOZ if self.rd.is_eof() => {
                    let what = if is_comment {
                        "unfinished long comment"
                    } else {
                        "unfinished long string"
                    };
                    return Err(self.error(what, "<eof>"));
                }
                b']' => {
                    let close_start = self.rd.pos();
                    self.rd.bump();
                    let mut found = 0usize;
                    while self.rd.current() == b'=' {
                        found += 1;
                        self.rd.bump();
                    }
                    if found == level && self.rd.current() == b']' {
                        self.rd.bump();
                        let content = self.rd.slice(start, close_start);
                        return Ok(self.strings.intern(content));
                    }
                    // not a closer at our level; keep scanning from here
                }
                b'\n' | b'\r' => self.inc_line(),
                _ => self.rd.bump(),
            }
        }
    }

    fn read_string(&mut self, quote: u8) -> CompileResult<LuaStr> {
        self.rd.bump(); // skip the opening quote
        self.buf.clear();
        loop {
            match self.rd.current() {
                EOZ if self.rd.is_eof() => {
                    return Err(self.error("unfinished string", "<eof>"));
                }
                b'\n' | b'\r' => {
                    return Err(self.error("unfinished string", &self.buf.clone()));
                }
                b'\\' => {
                    self.rd.bump();
                    match self.rd.current() {
                        b'a' => {
                            self.buf.push('\x07');
                            self.rd.bump();
                        }
                        b'b' => {
                            self.buf.push('\x08');
                            self.rd.bump();
                        }
                        b'f' => {
                            self.buf.push('\x0c');
                            self.rd.bump();
                        }
                        b'n' => {
                            self.buf.push('\n');
                            self.rd.bump();
                        }
                        b'r' => {
                            self.buf.push('\r');
                            self.rd.bump();
                        }
                        b't' => {
                            self.buf.push('\t');
                            self.rd.bump();
                        }
                        b'v' => {
                            self.buf.push('\x0b');
                            self.rd.bump();
                        }
                        b'\n' | b'\r' => {
                            self.buf.push('\n');
                            self.inc_line();
                        }
                        EOZ if self.rd.is_eof() => {
                            // the unfinished-string error fires on the next loop
                        }
                        c if is_digit(c) => {
                            // \ddd with up to three decimal digits
                            let mut value = 0u32;
                            let mut i = 0;
                            while i < 3 && is_digit(self.rd.current()) {
                                value = 10 * value + (self.rd.current() - b'0') as u32;
                                self.rd.bump();
                                i += 1;
                            }
                            if value > 255 {
                                return Err(self.error("escape sequence too large", &self.buf.clone()));
                            }
                            self.buf.push(value as u8 as char);
                        }
                        c => {
                            // any other escaped character stands for itself
                            self.push_raw_char(c);
                        }
                    }
                }
                c if c == quote => {
                    self.rd.bump();
                    return Ok(self.strings.intern(&self.buf));
                }
                _ => {
                    // copy a plain run in one go to keep UTF-8 intact
                    let start = self.rd.pos();
                    self.rd
                        .eat_while(|c| c != quote && c != b'\\' && c != b'\n' && c != b'\r');
                    let run = self.rd.slice(start, self.rd.pos());
                    self.buf.push_str(run);
                }
            }
        }
    }

    /// Push one source byte that begins at the current position, advancing
    /// past the whole character if it is multi-byte.
    fn push_raw_char(&mut self, first: u8) {
        if first < 0x80 {
            self.buf.push(first as char);
            self.rd.bump();
        } else {
            let start = self.rd.pos();
            self.rd.bump();
            self.rd.eat_while(|c| c & 0xc0 == 0x80);
            let run = self.rd.slice(start, self.rd.pos());
            self.buf.push_str(run);
        }
    }

    fn read_numeral(&mut self) -> CompileResult<Token> {
        let start = self.rd.pos();
        self.rd.eat_while(|c| is_digit(c) || c == b'.');
        if self.rd.current() == b'e' || self.rd.current() == b'E' {
            self.rd.bump();
            if self.rd.current() == b'+' || self.rd.current() == b'-' {
                self.rd.bump();
            }
        }
        self.rd.eat_while(|c| is_name_cont(c) || c == b'.');
        let text = self.rd.slice(start, self.rd.pos());
        match str2d(text) {
            Some(n) => Ok(Token {
                kind: TokenKind::TkNumber,
                value: TokenValue::Number(n),
            }),
            None => Err(self.error("malformed number", text)),
        }
    }
}

/// Convert numeral text to a number: decimal with optional fraction and
/// exponent, or `0x` hexadecimal.
fn str2d(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        let mut value = 0.0f64;
        for c in hex.chars() {
            value = value * 16.0 + c.to_digit(16)? as f64;
        }
        return Some(value);
    }
    // the scanner only produced [0-9.eE+-_a-z]; reject anything f64 won't take
    if text.starts_with('.') || text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        text.parse::<f64>().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds(src: &str) -> Vec<TokenKind> {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new(src, "t", &mut strings);
        let mut out = vec![];
        loop {
            lex.next_token().unwrap();
            out.push(lex.t.kind);
            if lex.t.kind == TokenKind::TkEof {
                return out;
            }
        }
    }

    #[test]
    fn keywords_and_symbols() {
        use TokenKind::*;
        assert_eq!(
            all_kinds("local x = 1 .. y ~= ..."),
            vec![TkLocal, TkName, TkAssign, TkNumber, TkConcat, TkName, TkNe, TkDots, TkEof]
        );
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            all_kinds("a -- line\n--[[ long\ncomment ]] b"),
            vec![TkName, TkName, TkEof]
        );
    }

    #[test]
    fn numbers() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new("3 3.5 1e2 0x10 .5", "t", &mut strings);
        let mut nums = vec![];
        loop {
            lex.next_token().unwrap();
            match &lex.t.value {
                TokenValue::Number(n) => nums.push(*n),
                _ => break,
            }
        }
        assert_eq!(nums, vec![3.0, 3.5, 100.0, 16.0, 0.5]);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new("3x7", "t", &mut strings);
        let err = lex.next_token().unwrap_err();
        assert!(err.message.contains("malformed number"));
    }

    #[test]
    fn string_escapes() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new(r#""a\n\116\"b""#, "t", &mut strings);
        lex.next_token().unwrap();
        match &lex.t.value {
            TokenValue::Str(s) => assert_eq!(s.as_str(), "a\nt\"b"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn long_strings_and_levels() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new("[==[a]b]]==]", "t", &mut strings);
        lex.next_token().unwrap();
        match &lex.t.value {
            TokenValue::Str(s) => assert_eq!(s.as_str(), "a]b]"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn unfinished_string_errors() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new("\"abc\ndef\"", "t", &mut strings);
        let err = lex.next_token().unwrap_err();
        assert!(err.message.contains("unfinished string"));
    }

    #[test]
    fn line_numbers_track_newlines() {
        let mut strings = StringInterner::new();
        let mut lex = Lexer::new("a\nb\r\nc", "t", &mut strings);
        lex.next_token().unwrap();
        assert_eq!(lex.linenumber, 1);
        lex.next_token().unwrap();
        assert_eq!(lex.linenumber, 2);
        lex.next_token().unwrap();
        assert_eq!(lex.linenumber, 3);
    }
}
