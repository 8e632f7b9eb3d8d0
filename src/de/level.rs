use crate::logger::LogLevel;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use std::fmt;

struct LogLevelVisitor;

impl<'de> Visitor<'de> for LogLevelVisitor {
    type Value = LogLevel;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("EMERG | ALERT | CRIT | ERR | WARNING | NOTICE | INFO | DEBUG")
    }

    fn visit_str<E>(self, s: &str) -> Result<LogLevel, E>
    where
        E: de::Error,
    {
        s.parse()
            .map_err(|_| E::custom(format!("Did not expect log level of: {}", s)))
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<LogLevel, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(LogLevelVisitor)
    }
}
