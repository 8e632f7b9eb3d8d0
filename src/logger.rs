use chrono::{SecondsFormat, Utc};
use env_logger::filter;
use log::{self, Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;

/// Builds the process logger. Filtering is delegated to `env_logger`'s filter so the usual
/// `module=level` directives work.
///
/// ```
/// use log::LevelFilter;
/// use ncollectd_core::logger::LoggerBuilder;
///
/// LoggerBuilder::new()
///     .prefix("mdb")
///     .filter_level(LevelFilter::Warn)
///     .try_init()
///     .ok();
/// ```
#[derive(Default)]
pub struct LoggerBuilder {
    filter: filter::Builder,
    prefix: Option<String>,
    sink: Option<Box<dyn Write + Send>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    fn build(&mut self) -> Logger {
        let sink = self
            .sink
            .take()
            .unwrap_or_else(|| Box::new(io::stderr()));
        Logger {
            filter: self.filter.build(),
            prefix: self.prefix.clone(),
            sink: Mutex::new(sink),
        }
    }

    pub fn try_init(&mut self) -> Result<(), SetLoggerError> {
        let logger = self.build();
        log::set_max_level(logger.filter());
        log::set_boxed_logger(Box::new(logger))
    }

    /// Prefixes every message with `name: `.
    pub fn prefix(&mut self, name: &str) -> &mut Self {
        self.prefix = Some(name.to_owned());
        self
    }

    /// Writes records to `sink` instead of stderr.
    pub fn target<W: Write + Send + 'static>(&mut self, sink: W) -> &mut Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn filter_level(&mut self, level: LevelFilter) -> &mut Self {
        self.filter.filter_level(level);
        self
    }

    pub fn filter_module(&mut self, module: &str, level: LevelFilter) -> &mut Self {
        self.filter.filter_module(module, level);
        self
    }

    pub fn filter(&mut self, module: Option<&str>, level: LevelFilter) -> &mut Self {
        self.filter.filter(module, level);
        self
    }

    pub fn parse(&mut self, filters: &str) -> &mut Self {
        self.filter.parse(filters);
        self
    }
}

struct Logger {
    filter: filter::Filter,
    prefix: Option<String>,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }

        let lvl = LogLevel::from(record.level());
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());

        // A failing log sink has nowhere left to report to.
        let _ = match self.prefix {
            Some(ref p) => writeln!(sink, "[{}] [{}] {}: {}", now, lvl, p, record.args()),
            None => writeln!(sink, "[{}] [{}] {}", now, lvl, record.args()),
        };
    }

    fn flush(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = sink.flush();
    }
}

impl Logger {
    fn filter(&self) -> LevelFilter {
        self.filter.filter()
    }
}

/// Syslog severities used for daemon log levels.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(i32)]
pub enum LogLevel {
    Error = libc::LOG_ERR,
    Warning = libc::LOG_WARNING,
    Notice = libc::LOG_NOTICE,
    Info = libc::LOG_INFO,
    Debug = libc::LOG_DEBUG,
}

impl LogLevel {
    /// Attempts to convert a syslog priority into a level
    pub fn try_from(s: i32) -> Option<LogLevel> {
        match s {
            libc::LOG_ERR => Some(LogLevel::Error),
            libc::LOG_WARNING => Some(LogLevel::Warning),
            libc::LOG_NOTICE => Some(LogLevel::Notice),
            libc::LOG_INFO => Some(LogLevel::Info),
            libc::LOG_DEBUG => Some(LogLevel::Debug),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Level> for LogLevel {
    fn from(lvl: Level) -> Self {
        match lvl {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warning,
            Level::Info => LogLevel::Info,
            Level::Debug | Level::Trace => LogLevel::Debug,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Notice | LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLogLevelError(pub String);

impl fmt::Display for ParseLogLevelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown log level: {}", self.0)
    }
}

impl std::error::Error for ParseLogLevelError {}

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emerg" | "alert" | "crit" | "err" | "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "notice" => Ok(LogLevel::Notice),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ParseLogLevelError(s.to_owned())),
        }
    }
}
