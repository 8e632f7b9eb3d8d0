use super::family::{
    Counter, Gauge, Metric, MetricFamily, MetricFamilyDispatcher, MetricType, Value,
};
use super::histogram::{Histogram, Summary};
use super::label_set::{parse_label_value, LabelSet};
use super::state_set::StateSet;
use crate::cdtime::CdTime;
use crate::errors::{ExpositionError, LabelError};
use crate::mql::util::is_label_char;
use log::debug;

/// What the caller should do after a line was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Continue,

    /// `# EOF` was read and the pending family dispatched
    End,
}

/// Role of a sample line inside its family, derived from the family type and the name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sample {
    Unknown,
    Gauge,
    Counter,
    StateSet,
    Info,
    Quantile,
    Count,
    Sum,
    Bucket,
    Created,
}

fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn skip_space(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }
    pos
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b':'
}

fn scan_name(bytes: &[u8], mut pos: usize) -> usize {
    if pos < bytes.len() && is_name_start(bytes[pos]) {
        pos += 1;
        while pos < bytes.len() && (is_label_char(bytes[pos]) || bytes[pos] == b':') {
            pos += 1;
        }
    }
    pos
}

fn type_from_name(name: &str) -> Option<MetricType> {
    Some(match name {
        "unknown" | "untyped" => MetricType::Unknown,
        "gauge" => MetricType::Gauge,
        "counter" => MetricType::Counter,
        "stateset" => MetricType::StateSet,
        "info" => MetricType::Info,
        "summary" => MetricType::Summary,
        "histogram" => MetricType::Histogram,
        "gaugehistogram" => MetricType::GaugeHistogram,
        _ => return None,
    })
}

/// Family name announced by a comment: counters and infos drop their sample suffix.
fn family_base(name: &str) -> &str {
    name.strip_suffix("_total")
        .or_else(|| name.strip_suffix("_info"))
        .unwrap_or(name)
}

/// Splits a sample name into its role and the family name it belongs to. `None` when the name
/// cannot be a sample of a `type_` family.
fn classify(type_: MetricType, name: &str) -> Option<(Sample, &str)> {
    let suffixed = |suffixes: &[(&str, Sample)]| {
        suffixes
            .iter()
            .find_map(|&(suffix, kind)| name.strip_suffix(suffix).map(|base| (kind, base)))
    };

    match type_ {
        MetricType::Unknown => Some((Sample::Unknown, name)),
        MetricType::Gauge => Some((Sample::Gauge, name)),
        MetricType::StateSet => Some((Sample::StateSet, name)),
        MetricType::Counter => {
            suffixed(&[("_total", Sample::Counter), ("_created", Sample::Created)])
                .or(Some((Sample::Counter, name)))
        }
        MetricType::Info => suffixed(&[("_info", Sample::Info)]).or(Some((Sample::Info, name))),
        MetricType::Summary => suffixed(&[
            ("_count", Sample::Count),
            ("_sum", Sample::Sum),
            ("_created", Sample::Created),
        ])
        .or(Some((Sample::Quantile, name))),
        MetricType::Histogram => suffixed(&[
            ("_count", Sample::Count),
            ("_sum", Sample::Sum),
            ("_bucket", Sample::Bucket),
            ("_created", Sample::Created),
        ]),
        MetricType::GaugeHistogram => suffixed(&[
            ("_gcount", Sample::Count),
            ("_gsum", Sample::Sum),
            ("_bucket", Sample::Bucket),
            ("_created", Sample::Created),
        ]),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix('+').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit())
}

/// Reads the text exposition format (Prometheus 0.0.4 and OpenMetrics) into metric families.
///
/// Lines are fed one at a time. Consecutive samples of one family are grouped; when a line
/// names another family the pending one is handed to the dispatcher. Summary quantiles,
/// histogram buckets and state set states are folded into one metric per label set.
///
/// ```
/// use ncollectd_core::metric::{MetricFamily, MetricParser, MetricType};
///
/// let text = "# TYPE http_requests counter\n\
///             http_requests_total{code=\"200\"} 1027 1395066363000\n\
///             http_requests_total{code=\"400\"} 3 1395066363000\n";
/// let mut families: Vec<MetricFamily> = Vec::new();
/// MetricParser::new().parse(text, &mut families, None).unwrap();
///
/// assert_eq!(families.len(), 1);
/// assert_eq!(families[0].type_, MetricType::Counter);
/// assert_eq!(families[0].metrics[1].label_get("code"), Some("400"));
/// ```
#[derive(Debug)]
pub struct MetricParser {
    fam: MetricFamily,
    prefix: String,
    labels: Option<LabelSet>,
    interval: CdTime,
    timestamp: CdTime,
    line: usize,
}

impl Default for MetricParser {
    fn default() -> Self {
        MetricParser::new()
    }
}

impl MetricParser {
    pub fn new() -> Self {
        MetricParser {
            fam: MetricFamily::new("", MetricType::Unknown),
            prefix: String::new(),
            labels: None,
            interval: CdTime::ZERO,
            timestamp: CdTime::ZERO,
            line: 0,
        }
    }

    /// Prepends `prefix` to every family name.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Labels added to every metric, replacing parsed labels of the same name.
    pub fn labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn interval(mut self, interval: CdTime) -> Self {
        self.interval = interval;
        self
    }

    /// Stamps every metric with `timestamp`, ignoring the timestamps in the text.
    pub fn timestamp(mut self, timestamp: CdTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Parses every line of `text` until `# EOF` or the end of input, then dispatches the
    /// pending family.
    pub fn parse<D>(
        &mut self,
        text: &str,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<(), ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        for line in text.lines() {
            if self.parse_line(line, dispatcher, filter)? == LineStatus::End {
                return Ok(());
            }
        }
        self.finish(dispatcher, filter)
    }

    /// Dispatches the family still being filled, if it holds any metric.
    pub fn finish<D>(
        &mut self,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<(), ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        if !self.fam.metrics.is_empty() {
            dispatcher.dispatch(&mut self.fam, filter, CdTime::ZERO)?;
        }
        self.fam = MetricFamily::new("", MetricType::Unknown);
        Ok(())
    }

    pub fn parse_line<D>(
        &mut self,
        line: &str,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<LineStatus, ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        self.line += 1;
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let bytes = line.as_bytes();
        let pos = skip_space(bytes, 0);

        match bytes.get(pos) {
            None => Ok(LineStatus::Continue),
            Some(b'#') => self.parse_comment(line, pos + 1, dispatcher, filter),
            Some(&c) if is_name_start(c) => {
                self.parse_sample(line, pos, dispatcher, filter)?;
                Ok(LineStatus::Continue)
            }
            Some(_) => Err(self.syntax(pos, "expected a metric name or a comment")),
        }
    }

    fn syntax(&self, offset: usize, reason: &'static str) -> ExpositionError {
        ExpositionError::Syntax {
            line: self.line,
            offset,
            reason,
        }
    }

    fn is_current(&self, base: &str) -> bool {
        !self.fam.name.is_empty() && self.fam.name.strip_prefix(self.prefix.as_str()) == Some(base)
    }

    /// Makes `base` the family being filled, dispatching the previous one.
    fn switch_family<D>(
        &mut self,
        base: &str,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<(), ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        if self.is_current(base) {
            return Ok(());
        }
        self.finish(dispatcher, filter)?;
        self.fam.name = format!("{}{}", self.prefix, base);
        Ok(())
    }

    fn parse_comment<D>(
        &mut self,
        line: &str,
        pos: usize,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<LineStatus, ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        let bytes = line.as_bytes();
        let pos = skip_space(bytes, pos);
        let rest = &line[pos..];

        let keywords = ["HELP", "TYPE", "UNIT", "EOF", "END"];
        let keyword = match keywords.iter().find(|k| rest.starts_with(*k)) {
            Some(k) => *k,
            None => return Ok(LineStatus::Continue),
        };
        let pos = pos + keyword.len();

        if keyword == "EOF" || keyword == "END" {
            if skip_space(bytes, pos) == bytes.len() {
                self.finish(dispatcher, filter)?;
                return Ok(LineStatus::End);
            }
            return Ok(LineStatus::Continue);
        }

        // `#HELPFUL` and the like are plain comments
        if !bytes.get(pos).copied().map_or(false, is_space) {
            return Ok(LineStatus::Continue);
        }
        let start = skip_space(bytes, pos);
        let end = scan_name(bytes, start);
        if end == start {
            return Err(self.syntax(start, "expected a metric name"));
        }
        self.switch_family(family_base(&line[start..end]), dispatcher, filter)?;

        if !bytes.get(end).copied().map_or(false, is_space) {
            return Err(self.syntax(end, "expected text after the metric name"));
        }
        let text_start = skip_space(bytes, end);
        let text = &line[text_start..];
        if text.is_empty() {
            return Err(self.syntax(text_start, "missing comment text"));
        }

        match keyword {
            "HELP" => self.fam.help = Some(text.to_owned()),
            "UNIT" => self.fam.unit = Some(text.to_owned()),
            _ => {
                if !self.fam.metrics.is_empty() {
                    return Err(ExpositionError::LateType {
                        line: self.line,
                        family: self.fam.name.clone(),
                    });
                }
                let name = text.trim_end();
                let type_ = type_from_name(name).ok_or_else(|| ExpositionError::UnknownType {
                    line: self.line,
                    name: name.to_owned(),
                })?;
                self.fam.type_ = type_;
            }
        }
        Ok(LineStatus::Continue)
    }

    /// Reads `{name="value",..}` starting just past the brace. The label named `special` is
    /// returned apart instead of being added to the set.
    fn parse_labels(
        &self,
        line: &str,
        mut pos: usize,
        special: Option<&str>,
    ) -> Result<(LabelSet, Option<String>, usize), ExpositionError> {
        let bytes = line.as_bytes();
        let mut labels = LabelSet::new();
        let mut special_value = None;
        let mut value = String::new();

        loop {
            pos = skip_space(bytes, pos);
            if bytes.get(pos) == Some(&b'}') {
                return Ok((labels, special_value, pos + 1));
            }

            let key_start = pos;
            while pos < bytes.len() && is_label_char(bytes[pos]) {
                pos += 1;
            }
            if pos == key_start {
                return Err(self.syntax(pos, "expected a label name"));
            }
            let key = &line[key_start..pos];

            pos = skip_space(bytes, pos);
            if bytes.get(pos) != Some(&b'=') {
                return Err(self.syntax(pos, "expected '=' after the label name"));
            }
            pos = skip_space(bytes, pos + 1);

            value.clear();
            pos = parse_label_value(line, pos, &mut value).map_err(|e| match e {
                LabelError::Unmarshal { offset, reason } => self.syntax(offset, reason),
                source => ExpositionError::Label {
                    line: self.line,
                    source,
                },
            })?;

            if special == Some(key) {
                special_value = Some(value.clone());
            } else {
                labels
                    .add(key, &value, true, false)
                    .map_err(|source| ExpositionError::Label {
                        line: self.line,
                        source,
                    })?;
            }

            pos = skip_space(bytes, pos);
            match bytes.get(pos) {
                Some(b',') => pos += 1,
                Some(b'}') => {}
                _ => return Err(self.syntax(pos, "expected ',' or '}'")),
            }
        }
    }

    fn parse_sample<D>(
        &mut self,
        line: &str,
        start: usize,
        dispatcher: &mut D,
        filter: Option<&D::Filter>,
    ) -> Result<(), ExpositionError>
    where
        D: MetricFamilyDispatcher,
    {
        let bytes = line.as_bytes();
        let end = scan_name(bytes, start);
        let name = &line[start..end];

        let type_ = if self.fam.name.is_empty() {
            MetricType::Unknown
        } else {
            self.fam.type_
        };
        let (kind, base) = match classify(type_, name) {
            Some((kind, base)) if self.is_current(base) => (kind, base),
            Some(_) => {
                self.finish(dispatcher, filter)?;
                (Sample::Unknown, name)
            }
            None => return Err(self.syntax(start, "sample name does not fit the family type")),
        };
        if kind == Sample::Created {
            return Ok(());
        }
        self.switch_family(base, dispatcher, filter)?;

        let special = match kind {
            Sample::StateSet => Some(base),
            Sample::Quantile => Some("quantile"),
            Sample::Bucket => Some("le"),
            _ => None,
        };

        let mut pos = skip_space(bytes, end);
        let mut labels = LabelSet::new();
        let mut special_value = None;
        if bytes.get(pos) == Some(&b'{') {
            let (set, value, next) = self.parse_labels(line, pos + 1, special)?;
            labels = set;
            special_value = value;
            pos = next;
            if !bytes.get(pos).copied().map_or(false, is_space) {
                return Err(self.syntax(pos, "expected a space before the sample value"));
            }
        } else if pos == end {
            return Err(self.syntax(pos, "expected a space before the sample value"));
        }
        if let Some(ref extra) = self.labels {
            labels
                .add_set(true, extra)
                .map_err(|source| ExpositionError::Label {
                    line: self.line,
                    source,
                })?;
        }

        let value_start = skip_space(bytes, pos);
        let mut value_end = value_start;
        while value_end < bytes.len() && !is_space(bytes[value_end]) {
            value_end += 1;
        }
        let number = &line[value_start..value_end];
        let value =
            parse_float(number).ok_or_else(|| self.syntax(value_start, "invalid sample value"))?;

        // anything after the timestamp, such as an exemplar, is ignored
        let mut time = self.timestamp;
        if time.is_zero() {
            let ts_start = skip_space(bytes, value_end);
            let mut ts_end = ts_start;
            while ts_end < bytes.len() && bytes[ts_end].is_ascii_digit() {
                ts_end += 1;
            }
            if ts_end > ts_start {
                let ms: u64 = line[ts_start..ts_end]
                    .parse()
                    .map_err(|_| self.syntax(ts_start, "timestamp out of range"))?;
                time = CdTime::from_millis(ms);
            }
        }

        self.add_sample(kind, number, value, labels, special_value, time)
    }

    fn add_sample(
        &mut self,
        kind: Sample,
        number: &str,
        value: f64,
        labels: LabelSet,
        special: Option<String>,
        time: CdTime,
    ) -> Result<(), ExpositionError> {
        let line = self.line;
        let missing = |reason| ExpositionError::Syntax {
            line,
            offset: 0,
            reason,
        };
        let scalar = match kind {
            Sample::Unknown => Some(Value::Unknown(Gauge::Float64(value))),
            Sample::Gauge => Some(Value::Gauge(Gauge::Float64(value))),
            Sample::Counter => Some(Value::Counter(match number.parse::<u64>() {
                Ok(v) if is_integer(number) => Counter::UInt64(v),
                _ => Counter::Float64(value),
            })),
            Sample::Info => Some(Value::Info(LabelSet::new())),
            _ => None,
        };
        if let Some(scalar) = scalar {
            let mut metric = Metric::new(scalar);
            metric.labels = labels;
            metric.time = time;
            metric.interval = self.interval;
            return Ok(self.fam.metric_append(metric)?);
        }

        let count = || {
            if value >= 0.0 && value.is_finite() {
                Ok(value as u64)
            } else {
                Err(missing("counts must be finite and not negative"))
            }
        };
        let interval = self.interval;
        match (kind, last_value(&mut self.fam, labels, time, interval)?) {
            (Sample::StateSet, Value::StateSet(set)) => {
                let state = special.ok_or_else(|| missing("state set sample without its state"))?;
                set.create(&state, value != 0.0)?;
            }
            (Sample::Quantile, Value::Summary(summary)) => {
                let quantile = special
                    .as_deref()
                    .and_then(parse_float)
                    .ok_or_else(|| missing("summary sample without a valid quantile label"))?;
                summary.quantile_append(quantile, value)?;
            }
            (Sample::Sum, Value::Summary(summary)) => summary.sum = value,
            (Sample::Count, Value::Summary(summary)) => summary.count = count()?,
            (Sample::Sum, Value::Histogram(histogram)) => histogram.set_sum(value),
            (Sample::Count, Value::Histogram(histogram)) => {
                histogram.bucket_append(f64::INFINITY, count()?)?
            }
            (Sample::Bucket, Value::Histogram(histogram)) => {
                let le = special
                    .as_deref()
                    .and_then(parse_float)
                    .ok_or_else(|| missing("bucket sample without a valid le label"))?;
                histogram.bucket_append(le, count()?)?;
            }
            (kind, value) => {
                debug!("{:?} sample does not apply to a {} value", kind, value.kind_name());
                return Err(missing("sample does not fit the family type"));
            }
        }
        Ok(())
    }
}

/// The value of the last metric when its labels equal `labels`, or of a new metric appended for
/// them.
fn last_value(
    fam: &mut MetricFamily,
    labels: LabelSet,
    time: CdTime,
    interval: CdTime,
) -> Result<&mut Value, ExpositionError> {
    let reuse = fam.metrics.last().map_or(false, |m| m.labels == labels);
    if !reuse {
        let value = match fam.type_ {
            MetricType::StateSet => Value::StateSet(StateSet::new()),
            MetricType::Summary => Value::Summary(Box::new(Summary::default())),
            _ => Value::Histogram(Box::new(Histogram::new())),
        };
        let mut metric = Metric::new(value);
        metric.labels = labels;
        metric.time = time;
        metric.interval = interval;
        fam.metric_append(metric)?;
    }
    let last = fam.metrics.len() - 1;
    Ok(&mut fam.metrics[last].value)
}
