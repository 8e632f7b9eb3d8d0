use serde::de;
use std::error;
use std::fmt::{self, Display};

#[derive(Clone, Debug, PartialEq)]
pub enum DeError {
    SerdeError(String),
    ExpectSingleValue,
    ExpectString,
    ExpectChar(String),
    ExpectBoolean,
    ExpectNumber,

    /// The number is fractional or does not fit the requested integer type
    NumberOutOfRange(f64),

    /// An error while deserializing the option `key` declared on `line`
    Field {
        key: String,
        line: u32,
        source: Box<DeError>,
    },
}

// serde::de::Error needs a concrete type implementing it, so the kinds live in `DeError` and this
// thin wrapper carries them through the deserializer.
#[derive(Debug, Clone, PartialEq)]
pub struct Error(pub DeError);

impl Error {
    /// Attributes the error to an option. The innermost option is kept when nested blocks fail.
    pub(crate) fn in_field(self, key: &str, line: u32) -> Self {
        if let DeError::Field { .. } = self.0 {
            return self;
        }
        Error(DeError::Field {
            key: key.to_owned(),
            line,
            source: Box::new(self.0),
        })
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error(DeError::SerdeError(msg.to_string()))
    }
}

impl error::Error for Error {}

impl Display for DeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DeError::SerdeError(ref s) => write!(f, "error from deserialization: {}", s),
            DeError::ExpectSingleValue => write!(f, "expecting values to contain a single entry"),
            DeError::ExpectString => write!(f, "expecting string"),
            DeError::ExpectChar(ref s) => {
                write!(f, "expecting string of length one, received `{}`", s)
            }
            DeError::ExpectBoolean => write!(f, "expecting boolean"),
            DeError::ExpectNumber => write!(f, "expecting number"),
            DeError::NumberOutOfRange(n) => {
                write!(f, "number {} is out of range for the target integer", n)
            }
            DeError::Field {
                ref key,
                line,
                ref source,
            } => write!(f, "option '{}' at line {}: {}", key, line, source),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
