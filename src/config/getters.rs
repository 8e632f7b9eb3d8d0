use super::{ConfigItem, ConfigValue};
use crate::cdtime::CdTime;
use crate::errors::ConfigError;
use crate::logger::LogLevel;
use crate::metric::{LabelSet, MetricType};
use crate::mql::parse_duration;
use regex::Regex;

/// Typed accessors for option values. Each getter checks the number and type of values and
/// reports failures naming the option, file and line.
impl ConfigItem {
    fn value_error(&self, reason: &str) -> ConfigError {
        ConfigError::Value {
            key: self.key.clone(),
            file: self.file.clone(),
            line: self.lineno,
            reason: reason.to_owned(),
        }
    }

    fn single(&self) -> Option<&ConfigValue> {
        match self.values.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn get_string(&self) -> Result<&str, ConfigError> {
        match self.single() {
            Some(ConfigValue::String(s)) => Ok(s.as_str()),
            _ => Err(self.value_error("requires exactly one string argument.")),
        }
    }

    fn get_number(&self) -> Result<f64, ConfigError> {
        match self.single() {
            Some(ConfigValue::Number(n)) => Ok(*n),
            _ => Err(self.value_error("requires exactly one numeric argument.")),
        }
    }

    /// The number truncated toward zero.
    pub fn get_int(&self) -> Result<i32, ConfigError> {
        let n = self.get_number()?;
        if n < f64::from(i32::MIN) || n > f64::from(i32::MAX) || n.is_nan() {
            return Err(self.value_error("is out of range for an integer."));
        }
        Ok(n as i32)
    }

    pub fn get_unsigned_int(&self) -> Result<u32, ConfigError> {
        let n = self.get_number()?;
        if !(n >= 0.0 && n <= f64::from(u32::MAX)) {
            return Err(self.value_error("requires a non-negative integer."));
        }
        Ok(n as u32)
    }

    pub fn get_double(&self) -> Result<f64, ConfigError> {
        self.get_number()
    }

    pub fn get_double_array(&self) -> Result<Vec<f64>, ConfigError> {
        if self.values.is_empty() {
            return Err(self.value_error("requires a list of numbers."));
        }
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| match *v {
                ConfigValue::Number(n) => Ok(n),
                _ => Err(self.value_error(&format!("argument {} must be a number.", i + 1))),
            })
            .collect()
    }

    pub fn get_boolean(&self) -> Result<bool, ConfigError> {
        match self.single() {
            Some(ConfigValue::Boolean(b)) => Ok(*b),
            _ => Err(self.value_error("requires exactly one boolean argument.")),
        }
    }

    /// Sets or clears `flag` in `flags` according to the boolean value.
    pub fn get_flag(&self, flags: &mut u32, flag: u32) -> Result<(), ConfigError> {
        if self.get_boolean()? {
            *flags |= flag;
        } else {
            *flags &= !flag;
        }
        Ok(())
    }

    /// A port number in 1-65535 given as a number or as a numeric string.
    pub fn get_port_number(&self) -> Result<u16, ConfigError> {
        let port = match self.single() {
            Some(ConfigValue::Number(n)) => (n + 0.5).floor(),
            Some(ConfigValue::String(s)) => match s.trim().parse::<u32>() {
                Ok(p) => f64::from(p),
                Err(_) => return Err(self.value_error("requires a numeric port.")),
            },
            _ => return Err(self.value_error("requires exactly one string argument.")),
        };

        if !(port >= 1.0 && port <= 65535.0) {
            return Err(self.value_error(&format!(
                "requires a port number in the range 1-65535, got {}.",
                port
            )));
        }
        Ok(port as u16)
    }

    /// Seconds as a non-negative number, converted to `CdTime`.
    pub fn get_cdtime(&self) -> Result<CdTime, ConfigError> {
        let n = self.get_number()?;
        if n < 0.0 {
            return Err(self.value_error("must not be negative."));
        }
        Ok(CdTime::from_secs_f64(n))
    }

    /// Milliseconds from a duration literal such as `1h30m`. A plain number is taken as seconds.
    pub fn get_duration(&self) -> Result<i64, ConfigError> {
        match self.single() {
            Some(ConfigValue::String(s)) => parse_duration(s)
                .map_err(|e| self.value_error(&format!("has an invalid duration: {}.", e))),
            Some(ConfigValue::Number(n)) => Ok((n * 1000.0).round() as i64),
            _ => Err(self.value_error("requires exactly one duration argument.")),
        }
    }

    /// Adds the `name value` pair of this option to `labels`, replacing an existing value.
    pub fn get_label(&self, labels: &mut LabelSet) -> Result<(), ConfigError> {
        match self.values.as_slice() {
            [ConfigValue::String(name), ConfigValue::String(value)] => {
                labels
                    .add(name, value, true, false)
                    .map_err(|e| self.value_error(&format!("has an invalid label: {}.", e)))?;
                Ok(())
            }
            _ => Err(self.value_error("requires exactly two string arguments.")),
        }
    }

    pub fn get_metric_type(&self) -> Result<MetricType, ConfigError> {
        let s = self.get_string()?.to_ascii_lowercase();
        match s.as_str() {
            "gauge" => Ok(MetricType::Gauge),
            "unknown" | "unknow" => Ok(MetricType::Unknown),
            "counter" => Ok(MetricType::Counter),
            "info" => Ok(MetricType::Info),
            _ => Err(self.value_error("must be: 'gauge', 'unknown', 'info' or 'counter'.")),
        }
    }

    pub fn get_log_level(&self) -> Result<LogLevel, ConfigError> {
        self.get_string()?.parse().map_err(|_| {
            self.value_error(
                "must be: 'emerg', 'alert', 'crit', 'err', 'warning', 'notice', 'info' or 'debug'.",
            )
        })
    }

    /// Compiles a `/regex/` value. A quoted string is accepted as the pattern too.
    pub fn get_regex(&self) -> Result<Regex, ConfigError> {
        let pattern = match self.single() {
            Some(ConfigValue::Regex(r)) | Some(ConfigValue::String(r)) => r,
            _ => return Err(self.value_error("requires exactly one regex argument.")),
        };
        Regex::new(pattern)
            .map_err(|e| self.value_error(&format!("has an invalid regex: {}.", e)))
    }
}
