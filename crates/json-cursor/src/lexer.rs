use std::fmt;
use std::iter::Peekable;

use smallvec::SmallVec;

/// A raw lexical token. `Str` covers both string values and object keys;
/// the cursor layer decides which one a given `Str` is.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    ObjOpen,
    ObjClose,
    ArrOpen,
    ArrClose,
    Colon,
    Comma,
    Str(String),
    Num(serde_json::Number),
    True,
    False,
    Null,
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lexeme::ObjOpen => write!(f, "`{{`"),
            Lexeme::ObjClose => write!(f, "`}}`"),
            Lexeme::ArrOpen => write!(f, "`[`"),
            Lexeme::ArrClose => write!(f, "`]`"),
            Lexeme::Colon => write!(f, "`:`"),
            Lexeme::Comma => write!(f, "`,`"),
            Lexeme::Str(_) => write!(f, "a string"),
            Lexeme::Num(_) => write!(f, "a number"),
            Lexeme::True | Lexeme::False => write!(f, "a boolean"),
            Lexeme::Null => write!(f, "`null`"),
        }
    }
}

/// A byte offset and the corresponding line and column number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub byte_offset: u64,
    pub line: u64,
    pub col: u64,
}

impl Location {
    fn advance(&mut self, b: u8) {
        if b == b'\n' {
            self.col = 0;
            self.line += 1;
        } else {
            self.col += 1;
        }
        self.byte_offset += 1;
    }
}

/// A malformed-input error, with the location at which it was detected.
#[derive(Debug)]
pub struct SyntaxError {
    msg: String,
    location: Location,
}

impl SyntaxError {
    pub fn new(msg: String, location: Location) -> SyntaxError {
        SyntaxError { msg, location }
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error at line:{}, col:{}: {}",
            self.location.line, self.location.col, &self.msg,
        )
    }
}

impl std::error::Error for SyntaxError {}

pub type LexResult<T> = Result<T, SyntaxError>;

/// A pull-based lexer which takes an iterator over bytes and emits [`Lexeme`]s.
///
/// Numbers keep their integer-ness: a literal without a fraction or exponent
/// becomes an `i64`/`u64`-backed [`serde_json::Number`], so trees built from
/// lexed input compare equal to `serde_json::json!` literals.
pub struct Lexer<I: Iterator<Item = u8>> {
    bytes: Peekable<I>,
    location: Location,
}

impl<I: Iterator<Item = u8>> Lexer<I> {
    pub fn new(bytes: I) -> Self {
        Lexer {
            bytes: bytes.peekable(),
            location: Location::default(),
        }
    }

    /// The location just past everything consumed so far. Before the next
    /// `next_lexeme` call this is (at most whitespace away from) the start
    /// of the next lexeme.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns an error if anything other than whitespace remains.
    pub fn expect_eof(&mut self) -> LexResult<()> {
        match self.skip_whitespace() {
            Some(b) => self.fail(&format!("expected end of input, found byte {b:#x}")),
            None => Ok(()),
        }
    }

    pub fn next_lexeme(&mut self) -> LexResult<Lexeme> {
        let b = self.skip_whitespace().ok_or_else(|| self.eof())?;
        let lexeme = match b {
            b'{' => Lexeme::ObjOpen,
            b'}' => Lexeme::ObjClose,
            b'[' => Lexeme::ArrOpen,
            b']' => Lexeme::ArrClose,
            b':' => Lexeme::Colon,
            b',' => Lexeme::Comma,
            b'"' => return self.scan_string(),
            b'-' | b'0'..=b'9' => return self.scan_number(),
            b't' => return self.scan_keyword("true", Lexeme::True),
            b'f' => return self.scan_keyword("false", Lexeme::False),
            b'n' => return self.scan_keyword("null", Lexeme::Null),
            b => return self.fail(&format!("invalid byte {b:#x}")),
        };
        self.take_byte()?;
        Ok(lexeme)
    }

    fn fail<T>(&self, msg: &str) -> LexResult<T> {
        Err(SyntaxError::new(msg.to_string(), self.location))
    }

    fn eof(&self) -> SyntaxError {
        SyntaxError::new(String::from("unexpected end of input"), self.location)
    }

    // Note: u8::is_ascii_whitespace also accepts U+000C FORM FEED, which is
    // not whitespace in JSON.
    fn skip_whitespace(&mut self) -> Option<u8> {
        loop {
            let b = *self.bytes.peek()?;
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                self.bytes.next();
                self.location.advance(b);
            } else {
                return Some(b);
            }
        }
    }

    fn take_byte(&mut self) -> LexResult<u8> {
        match self.bytes.next() {
            Some(b) => {
                self.location.advance(b);
                Ok(b)
            }
            None => Err(self.eof()),
        }
    }

    fn scan_keyword(&mut self, word: &'static str, lexeme: Lexeme) -> LexResult<Lexeme> {
        for expected in word.bytes() {
            let b = self.take_byte()?;
            if b != expected {
                return self.fail(&format!("unexpected byte {b:#x} while reading `{word}`"));
            }
        }
        Ok(lexeme)
    }

    fn scan_string(&mut self) -> LexResult<Lexeme> {
        debug_assert_eq!(self.bytes.peek(), Some(&b'"'));
        self.take_byte()?;

        let mut buf = SmallVec::<[u8; 24]>::new();
        loop {
            match self.take_byte()? {
                b'"' => {
                    let s = String::from_utf8(buf.to_vec()).map_err(|_| {
                        SyntaxError::new("string literal is not valid UTF-8".into(), self.location)
                    })?;
                    return Ok(Lexeme::Str(s));
                }
                b'\\' => self.scan_escape(&mut buf)?,
                // JSON requires control characters in strings to be escaped.
                // 0x7f (DEL) is fine despite being a control character.
                b if b < 0x20 => {
                    return self.fail(&format!("control character {b:#x} must be escaped"));
                }
                b => buf.push(b),
            }
        }
    }

    fn scan_escape(&mut self, buf: &mut SmallVec<[u8; 24]>) -> LexResult<()> {
        let unescaped = match self.take_byte()? {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x8,
            b'f' => 0xc,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                let c = self.scan_unicode_escape()?;
                buf.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
                return Ok(());
            }
            b => return self.fail(&format!("{b:#x} is not a valid escape character")),
        };
        buf.push(unescaped);
        Ok(())
    }

    fn scan_unicode_escape(&mut self) -> LexResult<char> {
        let u = self.scan_hex4()?;
        let c = match u {
            0xD800..=0xDBFF => {
                // A high surrogate; the low surrogate must follow directly.
                if self.take_byte()? != b'\\' || self.take_byte()? != b'u' {
                    return self.fail(&format!(
                        "UTF-16 high surrogate {u:#x} must be followed by a \\uXXXX low surrogate"
                    ));
                }
                let u2 = self.scan_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&u2) {
                    return self.fail(&format!(
                        "expected a UTF-16 low surrogate after {u:#x}, found {u2:#x}"
                    ));
                }
                let merged = 0x1_0000 + ((u32::from(u) & 0x3ff) << 10 | (u32::from(u2) & 0x3ff));
                char::from_u32(merged).unwrap()
            }
            0xDC00..=0xDFFF => {
                return self.fail(&format!("unpaired UTF-16 low surrogate {u:#x}"));
            }
            _ => char::from_u32(u32::from(u)).unwrap(),
        };
        Ok(c)
    }

    fn scan_hex4(&mut self) -> LexResult<u16> {
        let mut u = 0u16;
        for _ in 0..4 {
            let b = self.take_byte()?;
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => 10 + b - b'a',
                b'A'..=b'F' => 10 + b - b'A',
                _ => return self.fail(&format!("expected a hex digit in \\u escape, found {b:#x}")),
            };
            u = u * 16 + u16::from(digit);
        }
        Ok(u)
    }

    fn scan_digits(&mut self, out: &mut SmallVec<[u8; 16]>) -> usize {
        let mut count = 0;
        while let Some(b @ b'0'..=b'9') = self.bytes.peek().copied() {
            out.push(b);
            self.bytes.next();
            self.location.advance(b);
            count += 1;
        }
        count
    }

    fn scan_number(&mut self) -> LexResult<Lexeme> {
        let mut text = SmallVec::<[u8; 16]>::new();
        if self.bytes.peek() == Some(&b'-') {
            text.push(self.take_byte()?);
        }
        let int_start = text.len();

        let int_digits = self.scan_digits(&mut text);
        if int_digits == 0 {
            return self.fail("number literal has no digits in its integer part");
        }
        if int_digits > 1 && text[int_start] == b'0' {
            return self.fail("integer part of a number must not start with 0 (except for `0`)");
        }

        let mut is_float = false;
        if self.bytes.peek() == Some(&b'.') {
            is_float = true;
            text.push(self.take_byte()?);
            if self.scan_digits(&mut text) == 0 {
                return self.fail("number literal has no digits after the decimal point");
            }
        }
        if matches!(self.bytes.peek(), Some(b'e' | b'E')) {
            is_float = true;
            text.push(self.take_byte()?);
            if matches!(self.bytes.peek(), Some(b'+' | b'-')) {
                text.push(self.take_byte()?);
            }
            if self.scan_digits(&mut text) == 0 {
                return self.fail("number literal has no digits in its exponent");
            }
        }

        let text = std::str::from_utf8(&text).unwrap();
        let number = if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                serde_json::Number::from(i)
            } else if let Ok(u) = text.parse::<u64>() {
                serde_json::Number::from(u)
            } else {
                // Integer literal too large for 64 bits; keep it as a float.
                self.parse_f64(text)?
            }
        } else {
            self.parse_f64(text)?
        };
        Ok(Lexeme::Num(number))
    }

    fn parse_f64(&self, text: &str) -> LexResult<serde_json::Number> {
        match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            Some(n) => Ok(n),
            None => self.fail(&format!("number literal `{text}` is out of range")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lex_all(s: &str) -> LexResult<Vec<Lexeme>> {
        let mut lexer = Lexer::new(s.bytes());
        let mut out = Vec::new();
        loop {
            if lexer.expect_eof().is_ok() {
                return Ok(out);
            }
            out.push(lexer.next_lexeme()?);
        }
    }

    fn lex_one(s: &str) -> LexResult<Lexeme> {
        Lexer::new(s.bytes()).next_lexeme()
    }

    #[test]
    fn punctuation_and_keywords() {
        let lexemes = lex_all("[ { } ] : , true false null").unwrap();
        assert_eq!(
            lexemes,
            vec![
                Lexeme::ArrOpen,
                Lexeme::ObjOpen,
                Lexeme::ObjClose,
                Lexeme::ArrClose,
                Lexeme::Colon,
                Lexeme::Comma,
                Lexeme::True,
                Lexeme::False,
                Lexeme::Null,
            ]
        );
    }

    #[test]
    fn numbers_preserve_integerness() {
        assert_eq!(lex_one("0").unwrap(), Lexeme::Num(serde_json::Number::from(0)));
        assert_eq!(lex_one("-7").unwrap(), Lexeme::Num(serde_json::Number::from(-7)));
        assert_eq!(
            lex_one("18446744073709551615").unwrap(),
            Lexeme::Num(serde_json::Number::from(u64::MAX))
        );
        assert_eq!(
            lex_one("12.5").unwrap(),
            Lexeme::Num(serde_json::Number::from_f64(12.5).unwrap())
        );
        assert_eq!(
            lex_one("-0.54e2").unwrap(),
            Lexeme::Num(serde_json::Number::from_f64(-54.0).unwrap())
        );
        assert_eq!(
            lex_one("1e3").unwrap(),
            Lexeme::Num(serde_json::Number::from_f64(1000.0).unwrap())
        );
    }

    #[test]
    fn bad_numbers() {
        assert!(lex_one("01").is_err());
        assert!(lex_one("-").is_err());
        assert!(lex_one("1.").is_err());
        assert!(lex_one("1e").is_err());
        assert!(lex_one("1e+").is_err());
        assert!(lex_one("1e999").is_err());
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(lex_one(r#""plain""#).unwrap(), Lexeme::Str("plain".into()));
        assert_eq!(
            lex_one(r#""a\"b\\c\/d\n""#).unwrap(),
            Lexeme::Str("a\"b\\c/d\n".into())
        );
        assert_eq!(lex_one(r#""\u0041""#).unwrap(), Lexeme::Str("A".into()));
        // A surrogate pair, and the same character as raw UTF-8.
        assert_eq!(
            lex_one(r#""\uD83D\uDE00""#).unwrap(),
            Lexeme::Str("\u{1F600}".into())
        );
        assert_eq!(
            lex_one(r#""😀""#).unwrap(),
            Lexeme::Str("\u{1F600}".into())
        );
    }

    #[test]
    fn bad_strings() {
        assert!(lex_one("\"a\nb\"").is_err());
        assert!(lex_one(r#""\q""#).is_err());
        assert!(lex_one(r#""\uD83D""#).is_err());
        assert!(lex_one(r#""\uDE00""#).is_err());
        assert!(lex_one(r#""never closed"#).is_err());
    }

    #[test]
    fn error_carries_location() {
        let mut lexer = Lexer::new("  \n @".bytes());
        let err = lexer.next_lexeme().unwrap_err();
        assert_eq!(err.location().line, 1);
        assert_eq!(err.location().col, 1);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut lexer = Lexer::new("null  x".bytes());
        lexer.next_lexeme().unwrap();
        assert!(lexer.expect_eof().is_err());
    }
}
