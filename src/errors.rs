use crate::config::ConfigFile;
use crate::metric::MetricType;
use crate::xson::LexError;
use std::collections::TryReserveError;
use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors from appending to a `StrBuf`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufError {
    /// A fixed buffer has no room left for the write
    Full { capacity: usize },

    /// A growable buffer could not reserve more memory
    Alloc,
}

impl fmt::Display for BufError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BufError::Full { capacity } => write!(f, "fixed buffer of {} bytes is full", capacity),
            BufError::Alloc => write!(f, "unable to grow buffer"),
        }
    }
}

impl error::Error for BufError {}

impl From<TryReserveError> for BufError {
    fn from(_: TryReserveError) -> Self {
        BufError::Alloc
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    InvalidName(String),
    NotFound(String),
    AlreadyExists(String),
    Alloc,

    /// Malformed textual label set. The offset is the byte position in the input where parsing
    /// gave up.
    Unmarshal { offset: usize, reason: &'static str },
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LabelError::InvalidName(ref name) => write!(f, "invalid label name: `{}`", name),
            LabelError::NotFound(ref name) => write!(f, "label `{}` not found", name),
            LabelError::AlreadyExists(ref name) => write!(f, "label `{}` already exists", name),
            LabelError::Alloc => write!(f, "unable to allocate label storage"),
            LabelError::Unmarshal { offset, reason } => {
                write!(f, "malformed label set at offset {}: {}", offset, reason)
            }
        }
    }
}

impl error::Error for LabelError {}

impl From<TryReserveError> for LabelError {
    fn from(_: TryReserveError) -> Self {
        LabelError::Alloc
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// The value kind does not belong to the family type
    TypeMismatch {
        family: MetricType,
        value: &'static str,
    },
    InvalidHistogram(&'static str),
    Label(LabelError),
    Alloc,
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MetricError::TypeMismatch { family, value } => write!(
                f,
                "a {} value cannot be added to a {} family",
                value,
                family.as_str()
            ),
            MetricError::InvalidHistogram(reason) => write!(f, "invalid histogram: {}", reason),
            MetricError::Label(ref _e) => write!(f, "unable to set metric labels"),
            MetricError::Alloc => write!(f, "unable to allocate metric storage"),
        }
    }
}

impl error::Error for MetricError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MetricError::Label(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<LabelError> for MetricError {
    fn from(e: LabelError) -> Self {
        MetricError::Label(e)
    }
}

impl From<TryReserveError> for MetricError {
    fn from(_: TryReserveError) -> Self {
        MetricError::Alloc
    }
}

/// Errors from reading the metric text exposition format. `line` counts lines fed to the
/// parser, starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpositionError {
    Syntax {
        line: usize,
        offset: usize,
        reason: &'static str,
    },
    UnknownType {
        line: usize,
        name: String,
    },

    /// A `# TYPE` comment arrived after the family already received samples
    LateType {
        line: usize,
        family: String,
    },
    Label {
        line: usize,
        source: LabelError,
    },
    Metric(MetricError),
}

impl fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ExpositionError::Syntax {
                line,
                offset,
                reason,
            } => write!(f, "line {}, column {}: {}", line, offset + 1, reason),
            ExpositionError::UnknownType { line, ref name } => {
                write!(f, "line {}: unknown metric type `{}`", line, name)
            }
            ExpositionError::LateType { line, ref family } => write!(
                f,
                "line {}: type of `{}` declared after its samples",
                line, family
            ),
            ExpositionError::Label { line, ref source } => write!(f, "line {}: {}", line, source),
            ExpositionError::Metric(ref e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for ExpositionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ExpositionError::Label { ref source, .. } => Some(source),
            ExpositionError::Metric(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetricError> for ExpositionError {
    fn from(e: MetricError) -> Self {
        ExpositionError::Metric(e)
    }
}

impl From<TryReserveError> for ExpositionError {
    fn from(_: TryReserveError) -> Self {
        ExpositionError::Metric(MetricError::Alloc)
    }
}

/// Errors from building a metric matcher
#[derive(Debug, Clone)]
pub enum MatchError {
    /// `=` and `!=` need a value; an empty one is spelled as an existence test
    EmptyValue(String),
    InvalidRegex {
        name: String,
        source: regex::Error,
    },
    Syntax { offset: usize, reason: &'static str },
    Label(LabelError),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MatchError::EmptyValue(ref name) => {
                write!(f, "matcher for `{}` compares against an empty value", name)
            }
            MatchError::InvalidRegex {
                ref name,
                ref source,
            } => write!(f, "invalid regex for `{}`: {}", name, source),
            MatchError::Syntax { offset, reason } => {
                write!(f, "malformed matcher at offset {}: {}", offset, reason)
            }
            MatchError::Label(ref e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for MatchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MatchError::InvalidRegex { ref source, .. } => Some(source),
            MatchError::Label(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<LabelError> for MatchError {
    fn from(e: LabelError) -> Self {
        MatchError::Label(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqlError {
    NotSamples,
    NotSeries,
    Label(LabelError),
    Alloc,
}

impl fmt::Display for MqlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MqlError::NotSamples => write!(f, "value is not a sample list"),
            MqlError::NotSeries => write!(f, "value is not a series list"),
            MqlError::Label(ref _e) => write!(f, "unable to copy sample labels"),
            MqlError::Alloc => write!(f, "unable to allocate value storage"),
        }
    }
}

impl error::Error for MqlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MqlError::Label(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<LabelError> for MqlError {
    fn from(e: LabelError) -> Self {
        match e {
            LabelError::Alloc => MqlError::Alloc,
            e => MqlError::Label(e),
        }
    }
}

impl From<TryReserveError> for MqlError {
    fn from(_: TryReserveError) -> Self {
        MqlError::Alloc
    }
}

/// Errors from parsing a duration literal such as `1h30m`. Offsets are byte positions in the
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationError {
    Empty,
    MissingNumber(usize),
    UnknownUnit(usize),

    /// A unit was not strictly smaller than the one before it (`30m1h`)
    RangeOrder(usize),
    Overflow,
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DurationError::Empty => write!(f, "empty duration"),
            DurationError::MissingNumber(pos) => {
                write!(f, "expected a number before the unit at offset {}", pos)
            }
            DurationError::UnknownUnit(pos) => write!(f, "unknown duration unit at offset {}", pos),
            DurationError::RangeOrder(pos) => write!(
                f,
                "duration units must be in decreasing order, unit at offset {} is out of order",
                pos
            ),
            DurationError::Overflow => write!(f, "duration does not fit in 64 bits of milliseconds"),
        }
    }
}

impl error::Error for DurationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnquoteError {
    TooShort,
    NotQuoted,
    MismatchedQuotes,
}

impl fmt::Display for UnquoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            UnquoteError::TooShort => write!(f, "quoted string is too short"),
            UnquoteError::NotQuoted => write!(f, "string does not start with a quote"),
            UnquoteError::MismatchedQuotes => write!(f, "opening and closing quotes differ"),
        }
    }
}

impl error::Error for UnquoteError {}

fn file_name(file: &Option<ConfigFile>) -> &str {
    file.as_ref().map(|f| f.name()).unwrap_or("<string>")
}

/// Errors that occur while reading or interpreting configuration
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },

    /// Malformed configuration text, no tree is produced
    Parse {
        file: Option<ConfigFile>,
        line: u32,
        message: String,
    },

    /// A well formed option whose values do not fit what the getter expects
    Value {
        key: String,
        file: Option<ConfigFile>,
        line: u32,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Io { ref path, .. } => {
                write!(f, "unable to read config file {}", path.display())
            }
            ConfigError::Parse {
                ref file,
                line,
                ref message,
            } => write!(f, "{}:{}: {}", file_name(file), line, message),
            ConfigError::Value {
                ref key,
                ref file,
                line,
                ref reason,
            } => write!(
                f,
                "the '{}' option in {}:{} {}",
                key,
                file_name(file),
                line,
                reason
            ),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ConfigError::Io { ref source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XsonErrorKind {
    Lexical(LexError),
    Parse(&'static str),

    /// A callback asked the parser to stop. Not a syntax problem.
    Canceled,
}

/// A failed JSON parse. `offset` is the number of input bytes consumed when parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsonError {
    pub kind: XsonErrorKind,
    pub offset: usize,
}

impl fmt::Display for XsonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            XsonErrorKind::Lexical(e) => write!(f, "lexical error: {}", e.as_str()),
            XsonErrorKind::Parse(msg) => write!(f, "parse error: {}", msg),
            XsonErrorKind::Canceled => {
                write!(f, "parse error: client cancelled parse via callback return value")
            }
        }
    }
}

impl error::Error for XsonError {}

/// A JSON value of one kind was used where another was needed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsonTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl fmt::Display for XsonTypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected json {}, found {}", self.expected, self.found)
    }
}

impl error::Error for XsonTypeError {}

/// Errors raised by the MDB disk store
#[derive(Debug)]
pub enum MdbError {
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// The file is not an MDB file of a version we understand
    FormatMismatch { path: PathBuf, reason: String },

    /// Checksum, magic, or length arithmetic did not add up. Only the record at `offset` is
    /// affected unless the error came from `open`.
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    NotFound(u64),
    Deleted(u64),

    /// A field does not fit its on-disk width
    RecordTooLarge(&'static str),

    Alloc,
}

impl fmt::Display for MdbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MdbError::Io { op, ref path, .. } => write!(f, "{} {} failed", op, path.display()),
            MdbError::FormatMismatch {
                ref path,
                ref reason,
            } => write!(f, "{} is not a usable mdb file: {}", path.display(), reason),
            MdbError::Corrupt {
                ref path,
                offset,
                ref reason,
            } => write!(
                f,
                "corruption in {} at offset {}: {}",
                path.display(),
                offset,
                reason
            ),
            MdbError::NotFound(id) => write!(f, "record {} does not exist", id),
            MdbError::Deleted(id) => write!(f, "record {} was deleted", id),
            MdbError::RecordTooLarge(field) => write!(f, "record {} is too large", field),
            MdbError::Alloc => write!(f, "unable to allocate memory for a record"),
        }
    }
}

impl From<BufError> for MdbError {
    fn from(_: BufError) -> Self {
        MdbError::Alloc
    }
}

impl From<TryReserveError> for MdbError {
    fn from(_: TryReserveError) -> Self {
        MdbError::Alloc
    }
}

impl error::Error for MdbError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MdbError::Io { ref source, .. } => Some(source),
            _ => None,
        }
    }
}
