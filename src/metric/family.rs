use crate::cdtime::CdTime;
use crate::errors::MetricError;
use crate::metric::histogram::{Histogram, Summary};
use crate::metric::label_set::{AddStatus, LabelSet};
use crate::metric::state_set::StateSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Unknown,
    Gauge,
    Counter,
    StateSet,
    Info,
    Summary,
    Histogram,
    GaugeHistogram,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Unknown => "unknown",
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::StateSet => "stateset",
            MetricType::Info => "info",
            MetricType::Summary => "summary",
            MetricType::Histogram => "histogram",
            MetricType::GaugeHistogram => "gaugehistogram",
        }
    }

    /// Whether a value of this shape may be stored in a family of type `self`.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (MetricType::Unknown, Value::Unknown(_))
                | (MetricType::Gauge, Value::Gauge(_))
                | (MetricType::Counter, Value::Counter(_))
                | (MetricType::StateSet, Value::StateSet(_))
                | (MetricType::Info, Value::Info(_))
                | (MetricType::Summary, Value::Summary(_))
                | (MetricType::Histogram, Value::Histogram(_))
                | (MetricType::GaugeHistogram, Value::Histogram(_))
        )
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric sample of an unknown or gauge metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gauge {
    Float64(f64),
    Int64(i64),
}

impl Gauge {
    pub fn as_f64(self) -> f64 {
        match self {
            Gauge::Float64(v) => v,
            Gauge::Int64(v) => v as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Counter {
    UInt64(u64),
    Float64(f64),
}

impl Counter {
    pub fn as_f64(self) -> f64 {
        match self {
            Counter::UInt64(v) => v as f64,
            Counter::Float64(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unknown(Gauge),
    Gauge(Gauge),
    Counter(Counter),
    StateSet(StateSet),
    Info(LabelSet),
    Histogram(Box<Histogram>),
    Summary(Box<Summary>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match *self {
            Value::Unknown(_) => "unknown",
            Value::Gauge(_) => "gauge",
            Value::Counter(_) => "counter",
            Value::StateSet(_) => "stateset",
            Value::Info(_) => "info",
            Value::Histogram(_) => "histogram",
            Value::Summary(_) => "summary",
        }
    }

    pub fn try_clone(&self) -> Result<Value, MetricError> {
        Ok(match *self {
            Value::Unknown(v) => Value::Unknown(v),
            Value::Gauge(v) => Value::Gauge(v),
            Value::Counter(v) => Value::Counter(v),
            Value::StateSet(ref set) => Value::StateSet(set.try_clone()?),
            Value::Info(ref info) => Value::Info(info.try_clone()?),
            Value::Histogram(ref h) => Value::Histogram(h.clone()),
            Value::Summary(ref s) => Value::Summary(s.clone()),
        })
    }
}

/// One metric inside a family: its labels, value and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub labels: LabelSet,
    pub value: Value,
    pub time: CdTime,
    pub interval: CdTime,
}

impl Metric {
    pub fn new(value: Value) -> Self {
        Metric {
            labels: LabelSet::new(),
            value,
            time: CdTime::ZERO,
            interval: CdTime::ZERO,
        }
    }

    /// Adds or updates a label. An empty value removes it; removing an absent label is not an
    /// error.
    pub fn label_set(&mut self, name: &str, value: &str) -> Result<AddStatus, MetricError> {
        Ok(self.labels.add(name, value, true, false)?)
    }

    pub fn label_get(&self, name: &str) -> Option<&str> {
        self.labels.get(name)
    }
}

/// A group of metrics sharing a name and type
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: Option<String>,
    pub unit: Option<String>,
    pub type_: MetricType,
    pub metrics: Vec<Metric>,
}

impl MetricFamily {
    pub fn new(name: &str, type_: MetricType) -> Self {
        MetricFamily {
            name: name.to_owned(),
            help: None,
            unit: None,
            type_,
            metrics: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_owned());
        self
    }

    fn check(&self, value: &Value) -> Result<(), MetricError> {
        if self.type_.accepts(value) {
            Ok(())
        } else {
            Err(MetricError::TypeMismatch {
                family: self.type_,
                value: value.kind_name(),
            })
        }
    }

    /// Appends a metric built from a copy of `value`, a copy of `labels`, and `extra` pairs that
    /// override labels of the same name. Nothing is appended on error.
    pub fn append(
        &mut self,
        value: &Value,
        labels: Option<&LabelSet>,
        extra: &[(&str, &str)],
    ) -> Result<(), MetricError> {
        self.check(value)?;

        let mut set = match labels {
            Some(labels) => labels.try_clone()?,
            None => LabelSet::new(),
        };
        for (name, value) in extra {
            set.add(name, value, true, false)?;
        }

        let mut metric = Metric::new(value.try_clone()?);
        metric.labels = set;
        self.metrics.try_reserve(1)?;
        self.metrics.push(metric);
        Ok(())
    }

    /// Moves `metric` into the family.
    pub fn metric_append(&mut self, metric: Metric) -> Result<(), MetricError> {
        self.check(&metric.value)?;
        self.metrics.try_reserve(1)?;
        self.metrics.push(metric);
        Ok(())
    }

    /// Drops every metric, keeping the family's name and type.
    pub fn metric_reset(&mut self) {
        self.metrics.clear();
    }

    pub fn try_clone(&self) -> Result<MetricFamily, MetricError> {
        let mut metrics = Vec::new();
        metrics.try_reserve_exact(self.metrics.len())?;
        for m in self.metrics.iter() {
            metrics.push(Metric {
                labels: m.labels.try_clone()?,
                value: m.value.try_clone()?,
                time: m.time,
                interval: m.interval,
            });
        }
        Ok(MetricFamily {
            name: self.name.clone(),
            help: self.help.clone(),
            unit: self.unit.clone(),
            type_: self.type_,
            metrics,
        })
    }
}

/// Receiver of collected metric families, implemented by whatever sits downstream of the
/// collectors (write plugins, the store, a test sink).
///
/// Dispatching takes the metrics out of `fam`, leaving it empty and ready to be refilled.
pub trait MetricFamilyDispatcher {
    type Filter;

    fn dispatch(
        &mut self,
        fam: &mut MetricFamily,
        filter: Option<&Self::Filter>,
        time: CdTime,
    ) -> Result<(), MetricError>;
}

/// Collects dispatched families, stamping `time` on metrics that carry none.
impl MetricFamilyDispatcher for Vec<MetricFamily> {
    type Filter = ();

    fn dispatch(
        &mut self,
        fam: &mut MetricFamily,
        _filter: Option<&()>,
        time: CdTime,
    ) -> Result<(), MetricError> {
        let mut metrics = std::mem::take(&mut fam.metrics);
        for m in metrics.iter_mut() {
            if m.time.is_zero() {
                m.time = time;
            }
        }

        self.try_reserve(1)?;
        self.push(MetricFamily {
            name: fam.name.clone(),
            help: fam.help.clone(),
            unit: fam.unit.clone(),
            type_: fam.type_,
            metrics,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_names() {
        assert_eq!(MetricType::GaugeHistogram.as_str(), "gaugehistogram");
        assert_eq!(MetricType::StateSet.to_string(), "stateset");
    }

    #[test]
    fn test_append_clones_and_extends_labels() {
        let mut base = LabelSet::new();
        base.set("host", "a").unwrap();
        base.set("job", "node").unwrap();

        let mut fam = MetricFamily::new("cpu_seconds", MetricType::Counter);
        fam.append(
            &Value::Counter(Counter::UInt64(7)),
            Some(&base),
            &[("cpu", "0"), ("job", "override")],
        )
        .unwrap();

        assert_eq!(fam.metrics.len(), 1);
        let m = &fam.metrics[0];
        assert_eq!(m.label_get("cpu"), Some("0"));
        assert_eq!(m.label_get("job"), Some("override"));
        assert_eq!(base.get("job"), Some("node"));
    }

    #[test]
    fn test_append_rejects_mismatched_value() {
        let mut fam = MetricFamily::new("load", MetricType::Gauge);
        let err = fam
            .append(&Value::Counter(Counter::UInt64(1)), None, &[])
            .unwrap_err();
        assert_eq!(
            err,
            MetricError::TypeMismatch {
                family: MetricType::Gauge,
                value: "counter"
            }
        );
        assert!(fam.metrics.is_empty());

        let mut hist = MetricFamily::new("latency", MetricType::GaugeHistogram);
        hist.append(&Value::Histogram(Box::new(Histogram::new())), None, &[])
            .unwrap();
    }

    #[test]
    fn test_append_bad_extra_label_leaves_family_untouched() {
        let mut fam = MetricFamily::new("load", MetricType::Gauge);
        let res = fam.append(&Value::Gauge(Gauge::Float64(1.0)), None, &[("0bad", "x")]);
        assert!(res.is_err());
        assert!(fam.metrics.is_empty());
    }

    #[test]
    fn test_metric_label_set_removes_on_empty() {
        let mut m = Metric::new(Value::Gauge(Gauge::Int64(3)));
        m.label_set("a", "1").unwrap();
        assert_eq!(m.label_set("a", "").unwrap(), AddStatus::Removed);
        assert_eq!(m.label_set("missing", "").unwrap(), AddStatus::Unchanged);
        assert_eq!(m.label_get("a"), None);
    }

    #[test]
    fn test_dispatch_moves_metrics() {
        let mut sink: Vec<MetricFamily> = Vec::new();
        let mut fam = MetricFamily::new("up", MetricType::Gauge);
        fam.append(&Value::Gauge(Gauge::Float64(1.0)), None, &[])
            .unwrap();
        let mut timed = Metric::new(Value::Gauge(Gauge::Float64(0.0)));
        timed.time = CdTime(5);
        fam.metric_append(timed).unwrap();

        sink.dispatch(&mut fam, None, CdTime(99)).unwrap();
        assert!(fam.metrics.is_empty());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].metrics[0].time, CdTime(99));
        assert_eq!(sink[0].metrics[1].time, CdTime(5));
    }

    #[test]
    fn test_family_clone_is_deep() {
        let mut fam = MetricFamily::new("info", MetricType::Info);
        let mut info = LabelSet::new();
        info.set("version", "1.2").unwrap();
        fam.append(&Value::Info(info), None, &[]).unwrap();
        let mut copy = fam.try_clone().unwrap();
        copy.metric_reset();
        assert_eq!(fam.metrics.len(), 1);
    }
}
