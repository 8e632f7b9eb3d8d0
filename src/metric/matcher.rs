use super::label_set::{parse_label_value, LabelSet};
use crate::buf::StrBuf;
use crate::errors::{BufError, LabelError, MatchError};
use crate::mql::util::{is_label_char, is_label_name, is_metric_name};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

const NAME_LABEL: &str = "__name__";

/// Comparison applied to one label, or to the metric name when the label is `__name__`.
///
/// Regexes search anywhere in the value; anchor them with `^` and `$` to match it whole.
#[derive(Debug, Clone)]
pub enum MatchOp {
    Equal(String),
    NotEqual(String),
    Regex(Regex),
    NotRegex(Regex),
    Exists,
    NotExists,
}

impl MatchOp {
    /// Compiles `pattern` into a `Regex` operation, negated when `negate` is set.
    pub fn regex(name: &str, pattern: &str, negate: bool) -> Result<MatchOp, MatchError> {
        let re = Regex::new(pattern).map_err(|source| MatchError::InvalidRegex {
            name: name.to_owned(),
            source,
        })?;
        Ok(if negate {
            MatchOp::NotRegex(re)
        } else {
            MatchOp::Regex(re)
        })
    }

    fn test(&self, value: &str) -> bool {
        match *self {
            MatchOp::Equal(ref s) => value == s.as_str(),
            MatchOp::NotEqual(ref s) => value != s.as_str(),
            MatchOp::Regex(ref re) => re.is_match(value),
            MatchOp::NotRegex(ref re) => !re.is_match(value),
            MatchOp::Exists | MatchOp::NotExists => false,
        }
    }

    fn marshal(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        let (op, value) = match *self {
            MatchOp::Equal(ref s) => ("=", s.as_str()),
            MatchOp::NotEqual(ref s) => ("!=", s.as_str()),
            MatchOp::Regex(ref re) => ("=~", re.as_str()),
            MatchOp::NotRegex(ref re) => ("!~", re.as_str()),
            MatchOp::Exists => ("!=", ""),
            MatchOp::NotExists => ("=", ""),
        };
        buf.putstr(op)?;
        buf.putchar('"')?;
        buf.putescape_label(value)?;
        buf.putchar('"')
    }
}

#[derive(Debug, Clone)]
pub struct MatchPair {
    pub name: String,
    pub op: MatchOp,
}

/// A conjunction of label matchers in the `name{label="v",other=~"re"}` selector syntax.
///
/// Matchers on `__name__` test the metric name; the others test labels. A label matcher other
/// than `NotExists` fails when the label is absent.
///
/// ```
/// use ncollectd_core::metric::{LabelSet, MetricMatch};
///
/// let m: MetricMatch = r#"node_cpu_seconds_total{mode!="idle",cpu=~"^[0-3]$"}"#.parse().unwrap();
/// let labels: LabelSet = r#"{cpu="2",mode="user"}"#.parse().unwrap();
/// assert!(m.matches(Some("node_cpu_seconds_total"), Some(&labels)));
/// assert!(!m.matches(Some("node_load1"), Some(&labels)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricMatch {
    name: Vec<MatchPair>,
    labels: Vec<MatchPair>,
}

impl MetricMatch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.labels.is_empty()
    }

    /// Adds a matcher. `Equal` and `NotEqual` with an empty value are rejected; use
    /// `NotExists` and `Exists` instead.
    pub fn add(&mut self, name: &str, op: MatchOp) -> Result<(), MatchError> {
        match op {
            MatchOp::Equal(ref s) | MatchOp::NotEqual(ref s) if s.is_empty() => {
                return Err(MatchError::EmptyValue(name.to_owned()))
            }
            _ => {}
        }
        if name != NAME_LABEL && !is_label_name(name) {
            return Err(MatchError::Label(LabelError::InvalidName(name.to_owned())));
        }

        let list = if name == NAME_LABEL {
            &mut self.name
        } else {
            &mut self.labels
        };
        list.try_reserve(1).map_err(LabelError::from)?;
        list.push(MatchPair {
            name: name.to_owned(),
            op,
        });
        Ok(())
    }

    pub fn reset(&mut self) {
        self.name.clear();
        self.labels.clear();
    }

    /// Matchers that apply to the metric name.
    pub fn name_matchers(&self) -> &[MatchPair] {
        &self.name
    }

    pub fn label_matchers(&self) -> &[MatchPair] {
        &self.labels
    }

    /// Tests a metric. A `None` name or label set skips the matchers that apply to it.
    pub fn matches(&self, name: Option<&str>, labels: Option<&LabelSet>) -> bool {
        if let Some(name) = name {
            let name_ok = self.name.iter().all(|pair| match pair.op {
                MatchOp::Exists => true,
                MatchOp::NotExists => false,
                ref op => op.test(name),
            });
            if !name_ok {
                return false;
            }
        }

        if let Some(labels) = labels {
            return self
                .labels
                .iter()
                .all(|pair| match (&pair.op, labels.get(&pair.name)) {
                    (MatchOp::NotExists, value) => value.is_none(),
                    (MatchOp::Exists, value) => value.is_some(),
                    (_, None) => false,
                    (op, Some(value)) => op.test(value),
                });
        }
        true
    }

    /// Parses a selector from the front of `input`, advancing it past the closing brace, or past
    /// the metric name when no braces follow it.
    ///
    /// An empty value turns `=` into `NotExists` and `!=` into `Exists`.
    pub fn unmarshal(input: &mut &str) -> Result<MetricMatch, MatchError> {
        let text = *input;
        let bytes = text.as_bytes();
        let err = |offset, reason| Err(MatchError::Syntax { offset, reason });
        let mut matcher = MetricMatch::new();

        let mut pos = 0;
        while pos < bytes.len() && (is_label_char(bytes[pos]) || bytes[pos] == b':') {
            pos += 1;
        }
        if pos > 0 {
            let name = &text[..pos];
            if !is_metric_name(name) {
                return err(0, "invalid metric name");
            }
            matcher.add(NAME_LABEL, MatchOp::Equal(name.to_owned()))?;
            if bytes.get(pos) != Some(&b'{') {
                *input = &text[pos..];
                return Ok(matcher);
            }
        }

        if bytes.get(pos) != Some(&b'{') {
            return err(pos, "expected a metric name or '{'");
        }
        if bytes.get(pos + 1) == Some(&b'}') {
            *input = &text[pos + 2..];
            return Ok(matcher);
        }

        let mut value = String::new();
        while pos < bytes.len() && (bytes[pos] == b'{' || bytes[pos] == b',') {
            pos += 1;

            let key_start = pos;
            while pos < bytes.len() && is_label_char(bytes[pos]) {
                pos += 1;
            }
            if pos == key_start {
                return err(pos, "expected a label name");
            }
            let key = &text[key_start..pos];

            let (negate, regex) = match (bytes.get(pos), bytes.get(pos + 1)) {
                (Some(b'='), Some(b'~')) => (false, true),
                (Some(b'='), _) => (false, false),
                (Some(b'!'), Some(b'~')) => (true, true),
                (Some(b'!'), Some(b'=')) => (true, false),
                _ => return err(pos, "expected one of '=', '!=', '=~' or '!~'"),
            };
            pos += if regex || negate { 2 } else { 1 };

            value.clear();
            pos = parse_label_value(text, pos, &mut value).map_err(|e| match e {
                LabelError::Unmarshal { offset, reason } => MatchError::Syntax { offset, reason },
                e => MatchError::Label(e),
            })?;

            let op = match (regex, negate, value.is_empty()) {
                (true, _, _) => MatchOp::regex(key, &value, negate)?,
                (false, false, true) => MatchOp::NotExists,
                (false, true, true) => MatchOp::Exists,
                (false, false, false) => MatchOp::Equal(value.clone()),
                (false, true, false) => MatchOp::NotEqual(value.clone()),
            };
            matcher.add(key, op)?;
        }

        if bytes.get(pos) != Some(&b'}') {
            return err(pos, "expected '}' or ','");
        }
        *input = &text[pos + 1..];
        Ok(matcher)
    }

    /// Writes the selector form accepted by `unmarshal`.
    pub fn marshal(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        let mut pairs = self.name.iter().chain(self.labels.iter()).peekable();

        // a lone name equality is written bare
        if let Some(MatchOp::Equal(name)) = self.name.first().map(|p| &p.op) {
            if is_metric_name(name) {
                buf.putstr(name)?;
                pairs.next();
            }
        }
        if pairs.peek().is_none() && !self.name.is_empty() {
            return Ok(());
        }

        buf.putchar('{')?;
        for (i, pair) in pairs.enumerate() {
            if i > 0 {
                buf.putchar(',')?;
            }
            buf.putstr(&pair.name)?;
            pair.op.marshal(buf)?;
        }
        buf.putchar('}')
    }
}

impl fmt::Display for MetricMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = StrBuf::new();
        self.marshal(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(buf.as_str())
    }
}

impl FromStr for MetricMatch {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let matcher = MetricMatch::unmarshal(&mut rest)?;
        if !rest.trim_start().is_empty() {
            return Err(MatchError::Syntax {
                offset: s.len() - rest.len(),
                reason: "trailing characters after selector",
            });
        }
        Ok(matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> LabelSet {
        text.parse().unwrap()
    }

    #[test]
    fn test_name_only() {
        let m: MetricMatch = "node_load1".parse().unwrap();
        assert_eq!(m.name_matchers().len(), 1);
        assert!(m.label_matchers().is_empty());
        assert!(m.matches(Some("node_load1"), Some(&labels("{host=\"a\"}"))));
        assert!(!m.matches(Some("node_load5"), None));
        assert!(m.matches(None, None));
    }

    #[test]
    fn test_operators() {
        let m: MetricMatch = r#"{job="node",env!="dev",host=~"^db[0-9]+$",dc!~"eu-.*"}"#
            .parse()
            .unwrap();
        assert!(m.matches(None, Some(&labels(r#"{dc="us-1",env="prod",host="db12",job="node"}"#))));
        assert!(!m.matches(None, Some(&labels(r#"{dc="eu-2",env="prod",host="db12",job="node"}"#))));
        assert!(!m.matches(None, Some(&labels(r#"{dc="us-1",env="dev",host="db12",job="node"}"#))));
        assert!(!m.matches(None, Some(&labels(r#"{dc="us-1",env="prod",host="web1",job="node"}"#))));
        // absent labels only satisfy existence tests
        assert!(!m.matches(None, Some(&labels(r#"{env="prod",host="db12",job="node"}"#))));
    }

    #[test]
    fn test_empty_value_tests_existence() {
        let m: MetricMatch = r#"{a="",b!=""}"#.parse().unwrap();
        match (&m.label_matchers()[0].op, &m.label_matchers()[1].op) {
            (MatchOp::NotExists, MatchOp::Exists) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(m.matches(None, Some(&labels(r#"{b="1"}"#))));
        assert!(!m.matches(None, Some(&labels(r#"{a="1",b="1"}"#))));
        assert!(!m.matches(None, Some(&labels("{}"))));
    }

    #[test]
    fn test_name_label_applies_to_name() {
        assert!(r#"{__name__=~"^node_", mode="idle"}"#
            .parse::<MetricMatch>()
            .is_err());

        let m: MetricMatch = r#"{__name__=~"^node_",mode="idle"}"#.parse().unwrap();
        assert_eq!(m.name_matchers().len(), 1);
        assert!(m.matches(Some("node_cpu"), Some(&labels(r#"{mode="idle"}"#))));
        assert!(!m.matches(Some("go_gc"), Some(&labels(r#"{mode="idle"}"#))));
    }

    #[test]
    fn test_add_validates() {
        let mut m = MetricMatch::new();
        assert!(matches!(
            m.add("host", MatchOp::Equal(String::new())),
            Err(MatchError::EmptyValue(_))
        ));
        assert!(matches!(
            m.add("0host", MatchOp::Exists),
            Err(MatchError::Label(LabelError::InvalidName(_)))
        ));
        assert!(matches!(
            MatchOp::regex("host", "(", false),
            Err(MatchError::InvalidRegex { .. })
        ));
        m.add("host", MatchOp::regex("host", "^db", false).unwrap())
            .unwrap();
        assert!(m.matches(None, Some(&labels(r#"{host="db1"}"#))));
        m.reset();
        assert!(m.is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        for (text, offset) in &[
            ("{a~\"x\"}", 2),
            ("{a=x}", 3),
            ("{a=\"x\"", 6),
            ("{=\"x\"}", 1),
            ("up{a=\"x\"} extra", 9),
        ] {
            match text.parse::<MetricMatch>() {
                Err(MatchError::Syntax { offset: o, .. }) => assert_eq!(o, *offset, "{}", text),
                other => panic!("{}: unexpected {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_display_reparses() {
        let text = r#"up{job="a\"b",env!="",host=~"^db\\.",x!~"y"}"#;
        let m: MetricMatch = text.parse().unwrap();
        let shown = m.to_string();
        assert_eq!(shown, text);
        let again: MetricMatch = shown.parse().unwrap();
        assert_eq!(again.to_string(), shown);
    }

    #[test]
    fn test_unmarshal_advances() {
        let mut rest = "cpu{mode=\"idle\"} > 0.5";
        let m = MetricMatch::unmarshal(&mut rest).unwrap();
        assert_eq!(rest, " > 0.5");
        assert_eq!(m.label_matchers()[0].name, "mode");

        let mut rest = "load1 offset 5m";
        MetricMatch::unmarshal(&mut rest).unwrap();
        assert_eq!(rest, " offset 5m");
    }
}
