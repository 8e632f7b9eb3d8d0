//! JSON support: a streaming event parser, a value tree built on top of it, and JSON and YAML
//! renderers.
//!
//! The parser is a state machine driven one token at a time. Containers are tracked on an
//! explicit stack whose height is capped (`DEFAULT_MAX_DEPTH` unless overridden), and every
//! callback may cancel the parse.

mod encode;
mod lex;
mod parser;
mod render;
mod tree;
mod value;
mod yaml;

pub use self::lex::LexError;
pub use self::parser::{Callbacks, ParseOptions, Parser, DEFAULT_MAX_DEPTH};
pub use self::value::XsonValue;
pub use crate::errors::{XsonError, XsonErrorKind, XsonTypeError};
