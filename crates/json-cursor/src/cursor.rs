use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::lexer::{Lexeme, Lexer, Location, SyntaxError};

/// A structural token, one step of a document walk.
///
/// Unlike a raw [`Lexeme`], a `Token` is already aware of context: commas and
/// colons are consumed internally, and a string in key position comes out as
/// `FieldName` rather than `String`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

/// The fieldless counterpart of [`Token`], for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName,
    String,
    Number,
    Bool,
    Null,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::StartObject => TokenKind::StartObject,
            Token::EndObject => TokenKind::EndObject,
            Token::StartArray => TokenKind::StartArray,
            Token::EndArray => TokenKind::EndArray,
            Token::FieldName(_) => TokenKind::FieldName,
            Token::String(_) => TokenKind::String,
            Token::Number(_) => TokenKind::Number,
            Token::Bool(_) => TokenKind::Bool,
            Token::Null => TokenKind::Null,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::StartObject => "start of object",
            TokenKind::EndObject => "end of object",
            TokenKind::StartArray => "start of array",
            TokenKind::EndArray => "end of array",
            TokenKind::FieldName => "field name",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Bool => "boolean",
            TokenKind::Null => "null",
        };
        f.write_str(s)
    }
}

/// The error type of cursor operations: either the input is malformed, or a
/// subtree could not be decoded into the requested type.
#[derive(Debug)]
pub enum CursorError {
    Syntax(SyntaxError),
    Decode(serde_json::Error),
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::Syntax(e) => e.fmt(f),
            CursorError::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for CursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CursorError::Syntax(e) => Some(e),
            CursorError::Decode(e) => Some(e),
        }
    }
}

impl From<SyntaxError> for CursorError {
    fn from(e: SyntaxError) -> Self {
        CursorError::Syntax(e)
    }
}

impl From<serde_json::Error> for CursorError {
    fn from(e: serde_json::Error) -> Self {
        CursorError::Decode(e)
    }
}

pub type CursorResult<T> = Result<T, CursorError>;

#[derive(Debug, Clone, Copy)]
enum Scope {
    Object(ObjectScope),
    Array(ArrayScope),
}

#[derive(Debug, Clone, Copy)]
enum ObjectScope {
    BeforeFirstKey,
    AtMemberValue,
    AfterMemberValue,
}

#[derive(Debug, Clone, Copy)]
enum ArrayScope {
    BeforeFirstItem,
    AfterItem,
}

/// A cursor over the structural tokens of one JSON document.
///
/// The cursor starts *before* the first token; [`advance`](Self::advance)
/// moves it one token forward. After the root value closes, one further
/// `advance` verifies that only whitespace remains and parks the cursor at
/// `current() == None`.
///
/// [`read_tree`](Self::read_tree) and [`read_as`](Self::read_as) consume the
/// whole subtree rooted at the current token and leave the cursor on the
/// first token after it.
pub struct TokenCursor<I: Iterator<Item = u8>> {
    lexer: Lexer<I>,
    current: Option<Token>,
    scopes: Vec<Scope>,
    started: bool,
    finished: bool,
}

impl<I: Iterator<Item = u8>> TokenCursor<I> {
    pub fn new(bytes: I) -> Self {
        TokenCursor {
            lexer: Lexer::new(bytes),
            current: None,
            scopes: Vec::new(),
            started: false,
            finished: false,
        }
    }

    /// The token the cursor is on, or `None` past the end of the document.
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    pub fn current_kind(&self) -> Option<TokenKind> {
        self.current.as_ref().map(Token::kind)
    }

    /// The current field name, if the cursor is on a `FieldName` token.
    pub fn current_field_name(&self) -> Option<&str> {
        match &self.current {
            Some(Token::FieldName(name)) => Some(name),
            _ => None,
        }
    }

    pub fn location(&self) -> Location {
        self.lexer.location()
    }

    /// Moves to the next structural token. Advancing past the end of the
    /// document is a no-op.
    pub fn advance(&mut self) -> CursorResult<()> {
        if self.finished {
            self.current = None;
            return Ok(());
        }
        self.current = self.step()?;
        Ok(())
    }

    fn step(&mut self) -> CursorResult<Option<Token>> {
        if !self.started {
            self.started = true;
            let lexeme = self.lexer.next_lexeme()?;
            return self.enter_value(lexeme).map(Some);
        }

        let Some(scope) = self.scopes.last().copied() else {
            // The root value is complete.
            self.lexer.expect_eof()?;
            self.finished = true;
            return Ok(None);
        };

        match scope {
            Scope::Object(ObjectScope::BeforeFirstKey) => {
                let lexeme = self.lexer.next_lexeme()?;
                if lexeme == Lexeme::ObjClose {
                    self.scopes.pop();
                    return Ok(Some(Token::EndObject));
                }
                self.field_name(lexeme).map(Some)
            }
            Scope::Object(ObjectScope::AtMemberValue) => {
                self.set_object_scope(ObjectScope::AfterMemberValue);
                let lexeme = self.lexer.next_lexeme()?;
                self.enter_value(lexeme).map(Some)
            }
            Scope::Object(ObjectScope::AfterMemberValue) => {
                match self.lexer.next_lexeme()? {
                    Lexeme::Comma => {
                        let key = self.lexer.next_lexeme()?;
                        self.field_name(key).map(Some)
                    }
                    Lexeme::ObjClose => {
                        self.scopes.pop();
                        Ok(Some(Token::EndObject))
                    }
                    other => Err(self.unexpected("`,` or `}` after an object member", &other)),
                }
            }
            Scope::Array(ArrayScope::BeforeFirstItem) => {
                self.set_array_scope(ArrayScope::AfterItem);
                let lexeme = self.lexer.next_lexeme()?;
                if lexeme == Lexeme::ArrClose {
                    self.scopes.pop();
                    return Ok(Some(Token::EndArray));
                }
                self.enter_value(lexeme).map(Some)
            }
            Scope::Array(ArrayScope::AfterItem) => match self.lexer.next_lexeme()? {
                Lexeme::Comma => {
                    let lexeme = self.lexer.next_lexeme()?;
                    self.enter_value(lexeme).map(Some)
                }
                Lexeme::ArrClose => {
                    self.scopes.pop();
                    Ok(Some(Token::EndArray))
                }
                other => Err(self.unexpected("`,` or `]` after an array element", &other)),
            },
        }
    }

    fn enter_value(&mut self, lexeme: Lexeme) -> CursorResult<Token> {
        let token = match lexeme {
            Lexeme::ObjOpen => {
                self.scopes.push(Scope::Object(ObjectScope::BeforeFirstKey));
                Token::StartObject
            }
            Lexeme::ArrOpen => {
                self.scopes.push(Scope::Array(ArrayScope::BeforeFirstItem));
                Token::StartArray
            }
            Lexeme::Str(s) => Token::String(s),
            Lexeme::Num(n) => Token::Number(n),
            Lexeme::True => Token::Bool(true),
            Lexeme::False => Token::Bool(false),
            Lexeme::Null => Token::Null,
            other => return Err(self.unexpected("a value", &other)),
        };
        Ok(token)
    }

    fn field_name(&mut self, lexeme: Lexeme) -> CursorResult<Token> {
        let Lexeme::Str(name) = lexeme else {
            return Err(self.unexpected("a string key", &lexeme));
        };
        let colon = self.lexer.next_lexeme()?;
        if colon != Lexeme::Colon {
            return Err(self.unexpected("`:` after an object key", &colon));
        }
        self.set_object_scope(ObjectScope::AtMemberValue);
        Ok(Token::FieldName(name))
    }

    fn set_object_scope(&mut self, state: ObjectScope) {
        if let Some(Scope::Object(s)) = self.scopes.last_mut() {
            *s = state;
        }
    }

    fn set_array_scope(&mut self, state: ArrayScope) {
        if let Some(Scope::Array(s)) = self.scopes.last_mut() {
            *s = state;
        }
    }

    fn unexpected(&self, expected: &str, found: &Lexeme) -> CursorError {
        CursorError::Syntax(SyntaxError::new(
            format!("expected {expected}, found {found}"),
            self.lexer.location(),
        ))
    }

    fn state_err(&self, msg: String) -> CursorError {
        CursorError::Syntax(SyntaxError::new(msg, self.lexer.location()))
    }

    /// Reads the whole subtree rooted at the current token into a
    /// [`serde_json::Value`], leaving the cursor on the first token after it.
    ///
    /// The current token must be the start of a value; reading at a
    /// `FieldName` or past the end of the document is an error.
    pub fn read_tree(&mut self) -> CursorResult<Value> {
        let token = match self.current.take() {
            Some(t) => t,
            None => return Err(self.state_err("cannot read a value at end of input".into())),
        };
        let value = match token {
            Token::Null => Value::Null,
            Token::Bool(b) => Value::Bool(b),
            Token::Number(n) => Value::Number(n),
            Token::String(s) => Value::String(s),
            Token::StartArray => {
                self.advance()?;
                let mut items = Vec::new();
                while self.current_kind() != Some(TokenKind::EndArray) {
                    items.push(self.read_tree()?);
                }
                Value::Array(items)
            }
            Token::StartObject => {
                self.advance()?;
                let mut members = Map::new();
                loop {
                    match self.current.take() {
                        Some(Token::EndObject) => break,
                        Some(Token::FieldName(name)) => {
                            self.advance()?;
                            let value = self.read_tree()?;
                            members.insert(name, value);
                        }
                        other => {
                            return Err(self.state_err(format!(
                                "expected a field name or end of object, got {other:?}"
                            )));
                        }
                    }
                }
                Value::Object(members)
            }
            Token::FieldName(name) => {
                return Err(self.state_err(format!("cannot read field name `{name}` as a value")));
            }
            token @ (Token::EndObject | Token::EndArray) => {
                return Err(self.state_err(format!("cannot read a value at {:?}", token.kind())));
            }
        };
        self.advance()?;
        Ok(value)
    }

    /// [`read_tree`](Self::read_tree), then decode the tree into `T`.
    pub fn read_as<T: DeserializeOwned>(&mut self) -> CursorResult<T> {
        let tree = self.read_tree()?;
        serde_json::from_value(tree).map_err(CursorError::Decode)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn walk(s: &str) -> CursorResult<Vec<Token>> {
        let mut cursor = TokenCursor::new(s.bytes());
        let mut tokens = Vec::new();
        loop {
            cursor.advance()?;
            match cursor.current() {
                Some(token) => tokens.push(token.clone()),
                None => return Ok(tokens),
            }
        }
    }

    #[test]
    fn walks_a_mixed_document() {
        let tokens = walk(r#"{"k1": 1, "k2": [true, null], "k3": "v"}"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::StartObject,
                Token::FieldName("k1".into()),
                Token::Number(serde_json::Number::from(1)),
                Token::FieldName("k2".into()),
                Token::StartArray,
                Token::Bool(true),
                Token::Null,
                Token::EndArray,
                Token::FieldName("k3".into()),
                Token::String("v".into()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn scalar_document() {
        assert_eq!(walk("42").unwrap(), vec![Token::Number(42.into())]);
    }

    #[test]
    fn empty_containers() {
        assert_eq!(walk("{}").unwrap(), vec![Token::StartObject, Token::EndObject]);
        assert_eq!(walk("[]").unwrap(), vec![Token::StartArray, Token::EndArray]);
    }

    #[test]
    fn structural_errors() {
        assert!(walk(r#"{"a" 1}"#).is_err()); // missing colon
        assert!(walk(r#"{1: 2}"#).is_err()); // non-string key
        assert!(walk("[1 2]").is_err()); // missing comma
        assert!(walk("[1,]").is_err()); // trailing comma
        assert!(walk("{} {}").is_err()); // trailing garbage
        assert!(walk("]").is_err()); // not a value
    }

    #[test]
    fn read_tree_matches_json_macro() {
        let doc = r#"{"a": 1, "b": [2.5, {"c": null}], "d": "x"}"#;
        let mut cursor = TokenCursor::new(doc.bytes());
        cursor.advance().unwrap();
        let tree = cursor.read_tree().unwrap();
        assert_eq!(tree, json!({"a": 1, "b": [2.5, {"c": null}], "d": "x"}));
        assert!(cursor.current().is_none());
    }

    #[test]
    fn read_tree_leaves_cursor_after_subtree() {
        let doc = r#"{"skip": {"deep": [1, 2]}, "next": 3}"#;
        let mut cursor = TokenCursor::new(doc.bytes());
        cursor.advance().unwrap(); // StartObject
        cursor.advance().unwrap(); // FieldName("skip")
        cursor.advance().unwrap(); // value start
        let skipped = cursor.read_tree().unwrap();
        assert_eq!(skipped, json!({"deep": [1, 2]}));
        assert_eq!(cursor.current_field_name(), Some("next"));
    }

    #[test]
    fn read_as_decodes_and_reports() {
        let mut cursor = TokenCursor::new("[1, 2, 3]".bytes());
        cursor.advance().unwrap();
        let values: Vec<u32> = cursor.read_as().unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        let mut cursor = TokenCursor::new(r#""nope""#.bytes());
        cursor.advance().unwrap();
        let result: CursorResult<u32> = cursor.read_as();
        assert!(matches!(result, Err(CursorError::Decode(_))));
    }

    #[test]
    fn read_tree_at_field_name_is_an_error() {
        let mut cursor = TokenCursor::new(r#"{"a": 1}"#.bytes());
        cursor.advance().unwrap();
        cursor.advance().unwrap();
        assert!(cursor.read_tree().is_err());
    }
}
