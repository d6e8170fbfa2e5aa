//! A pull-based cursor over the structural tokens of a JSON document.
//!
//! [`TokenCursor`] advances one token at a time (`StartObject`,
//! `FieldName`, scalars, `EndArray` and so on) and can consume the whole
//! subtree under the current token into a [`serde_json::Value`] (or decode
//! it straight into a target type) without the caller seeing the
//! intermediate tokens. This makes it possible to walk a large document
//! while only ever materializing the pieces the caller asks for.
//!
//! ```
//! use json_cursor::{TokenCursor, TokenKind};
//!
//! # fn main() {
//! let doc = r#"{"id": 7, "tags": ["a", "b"]}"#;
//! let mut cursor = TokenCursor::new(doc.bytes());
//! cursor.advance().unwrap();
//! assert_eq!(cursor.current_kind(), Some(TokenKind::StartObject));
//! cursor.advance().unwrap();
//! assert_eq!(cursor.current_field_name(), Some("id"));
//! cursor.advance().unwrap();
//! let id = cursor.read_tree().unwrap();
//! assert_eq!(id, serde_json::json!(7));
//! // read_tree leaves the cursor on the token after the subtree.
//! assert_eq!(cursor.current_field_name(), Some("tags"));
//! # }
//! ```

mod cursor;
mod io;
mod lexer;

pub use cursor::*;
pub use io::*;
pub use lexer::*;
