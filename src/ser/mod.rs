use crate::cdtime::CdTime;
use crate::metric::{
    Bucket, Counter, Gauge, Histogram, LabelSet, Metric, MetricFamily, MetricType, Quantile,
    StateSet, Summary, Value,
};
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

impl Serialize for Gauge {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Gauge::Float64(x) => serializer.serialize_f64(x),
            Gauge::Int64(x) => serializer.serialize_i64(x),
        }
    }
}

impl Serialize for Counter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Counter::UInt64(x) => serializer.serialize_u64(x),
            Counter::Float64(x) => serializer.serialize_f64(x),
        }
    }
}

/// Values serialize as their payload; the family carries the type.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Value::Unknown(ref g) | Value::Gauge(ref g) => g.serialize(serializer),
            Value::Counter(ref c) => c.serialize(serializer),
            Value::StateSet(ref set) => set.serialize(serializer),
            Value::Info(ref labels) => labels.serialize(serializer),
            Value::Histogram(ref h) => h.serialize(serializer),
            Value::Summary(ref s) => s.serialize(serializer),
        }
    }
}

/// A label set is a map from label name to value, in name order.
impl Serialize for LabelSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for pair in self.iter() {
            map.serialize_entry(&pair.name, &pair.value)?;
        }
        map.end()
    }
}

impl Serialize for StateSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for state in self.iter() {
            map.serialize_entry(&state.name, &state.enabled)?;
        }
        map.end()
    }
}

impl Serialize for Bucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Bucket", 2)?;
        s.serialize_field("le", &self.maximum)?;
        s.serialize_field("count", &self.counter)?;
        s.end()
    }
}

impl Serialize for Histogram {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Histogram", 3)?;
        s.serialize_field("sum", &self.sum())?;
        s.serialize_field("count", &self.count())?;
        s.serialize_field("buckets", self.buckets())?;
        s.end()
    }
}

impl Serialize for Quantile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.quantile)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

impl Serialize for Summary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Summary", 3)?;
        s.serialize_field("sum", &self.sum)?;
        s.serialize_field("count", &self.count)?;
        s.serialize_field("quantiles", &self.quantiles)?;
        s.end()
    }
}

impl Serialize for MetricType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Timestamps serialize as fractional seconds since the epoch.
impl Serialize for CdTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl Serialize for Metric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Metric", 4)?;
        s.serialize_field("labels", &self.labels)?;
        s.serialize_field("value", &self.value)?;
        s.serialize_field("time", &self.time)?;
        s.serialize_field("interval", &self.interval)?;
        s.end()
    }
}

impl Serialize for MetricFamily {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("MetricFamily", 5)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("help", &self.help)?;
        s.serialize_field("unit", &self.unit)?;
        s.serialize_field("type", &self.type_)?;
        s.serialize_field("metrics", &self.metrics)?;
        s.end()
    }
}
