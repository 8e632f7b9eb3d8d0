use crate::buf::format_double;
use crate::errors::MqlError;
use crate::metric::LabelSet;
use std::fmt;

/// A timestamp in milliseconds and its value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
}

/// Series identity. The name is absent for results that dropped the metric family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricId {
    pub name: Option<String>,
    pub labels: LabelSet,
}

impl MetricId {
    pub fn new(name: &str, labels: LabelSet) -> Self {
        MetricId {
            name: Some(name.to_owned()),
            labels,
        }
    }

    fn try_clone(&self, keep_name: bool) -> Result<MetricId, MqlError> {
        let name = match self.name {
            Some(ref name) if keep_name => {
                let mut owned = String::new();
                owned.try_reserve_exact(name.len())?;
                owned.push_str(name);
                Some(owned)
            }
            _ => None,
        };
        Ok(MetricId {
            name,
            labels: self.labels.try_clone()?,
        })
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref name) = self.name {
            f.write_str(name)?;
        }
        write!(f, "{}", self.labels)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: MetricId,
    pub point: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Serie {
    pub metric: MetricId,
    pub points: Vec<Point>,
}

/// Result of evaluating a query: nothing, one scalar, an instant vector of samples, or a range
/// vector of series. Every string, label set and point array is owned by the value.
#[derive(Debug, Clone, PartialEq)]
pub enum MqlValue {
    None,
    Scalar(Point),
    Samples(Vec<Sample>),
    Series(Vec<Serie>),
}

impl MqlValue {
    pub fn scalar(timestamp: i64, value: f64) -> Self {
        MqlValue::Scalar(Point { timestamp, value })
    }

    pub fn samples() -> Self {
        MqlValue::Samples(Vec::new())
    }

    pub fn series() -> Self {
        MqlValue::Series(Vec::new())
    }

    pub fn kind_name(&self) -> &'static str {
        match *self {
            MqlValue::None => "none",
            MqlValue::Scalar(_) => "scalar",
            MqlValue::Samples(_) => "samples",
            MqlValue::Series(_) => "series",
        }
    }

    /// Appends a deep copy of `serie`. Fails with `NotSeries` on any other kind of value.
    pub fn series_add(&mut self, serie: &Serie) -> Result<(), MqlError> {
        let list = match *self {
            MqlValue::Series(ref mut list) => list,
            _ => return Err(MqlError::NotSeries),
        };

        let metric = serie.metric.try_clone(true)?;
        let mut points = Vec::new();
        points.try_reserve_exact(serie.points.len())?;
        points.extend_from_slice(&serie.points);

        list.try_reserve(1)?;
        list.push(Serie { metric, points });
        Ok(())
    }

    /// Appends a deep copy of `sample`. Fails with `NotSamples` on any other kind of value.
    pub fn samples_add(&mut self, sample: &Sample) -> Result<(), MqlError> {
        let list = match *self {
            MqlValue::Samples(ref mut list) => list,
            _ => return Err(MqlError::NotSamples),
        };

        let metric = sample.metric.try_clone(true)?;
        list.try_reserve(1)?;
        list.push(Sample {
            metric,
            point: sample.point,
        });
        Ok(())
    }

    /// Deep copy of a sample list. With `drop_family` the copies lose their metric name and keep
    /// only labels and points.
    pub fn samples_dup(&self, drop_family: bool) -> Result<MqlValue, MqlError> {
        let list = match *self {
            MqlValue::Samples(ref list) => list,
            _ => return Err(MqlError::NotSamples),
        };

        let mut out = Vec::new();
        out.try_reserve_exact(list.len())?;
        for sample in list.iter() {
            out.push(Sample {
                metric: sample.metric.try_clone(!drop_family)?,
                point: sample.point,
            });
        }
        Ok(MqlValue::Samples(out))
    }
}

impl fmt::Display for MqlValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MqlValue::None => writeln!(f, "none"),
            MqlValue::Scalar(p) => {
                writeln!(f, "scalar: {} @{}", format_double(p.value), p.timestamp)
            }
            MqlValue::Samples(ref list) => {
                for sample in list.iter() {
                    writeln!(
                        f,
                        "{} {} @{}",
                        sample.metric,
                        format_double(sample.point.value),
                        sample.point.timestamp
                    )?;
                }
                Ok(())
            }
            MqlValue::Series(ref list) => {
                for serie in list.iter() {
                    writeln!(f, "{}", serie.metric)?;
                    for p in serie.points.iter() {
                        writeln!(f, "    {} @{}", format_double(p.value), p.timestamp)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, host: &str, value: f64) -> Sample {
        let mut labels = LabelSet::new();
        labels.set("host", host).unwrap();
        Sample {
            metric: MetricId::new(name, labels),
            point: Point {
                timestamp: 1000,
                value,
            },
        }
    }

    #[test]
    fn test_samples_add_copies() {
        let mut value = MqlValue::samples();
        let src = sample("up", "a", 1.0);
        value.samples_add(&src).unwrap();
        drop(src);
        match value {
            MqlValue::Samples(ref list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].metric.labels.get("host"), Some("a"));
            }
            _ => panic!("expected samples"),
        }
    }

    #[test]
    fn test_samples_dup_drop_family() {
        let mut value = MqlValue::samples();
        value.samples_add(&sample("up", "a", 1.0)).unwrap();
        value.samples_add(&sample("up", "b", 0.0)).unwrap();

        let kept = value.samples_dup(false).unwrap();
        assert_eq!(kept, value);

        let dropped = value.samples_dup(true).unwrap();
        match dropped {
            MqlValue::Samples(ref list) => {
                assert!(list.iter().all(|s| s.metric.name.is_none()));
                assert_eq!(list[1].metric.labels.get("host"), Some("b"));
            }
            _ => panic!("expected samples"),
        }
    }

    #[test]
    fn test_wrong_kind() {
        let scalar = MqlValue::scalar(5, 2.0);
        assert_eq!(scalar.samples_dup(true), Err(MqlError::NotSamples));

        let mut series = MqlValue::series();
        assert_eq!(
            series.samples_add(&sample("up", "a", 1.0)),
            Err(MqlError::NotSamples)
        );

        let mut samples = MqlValue::samples();
        let serie = Serie {
            metric: MetricId::default(),
            points: Vec::new(),
        };
        assert_eq!(samples.series_add(&serie), Err(MqlError::NotSeries));
    }

    #[test]
    fn test_series_add_and_dump() {
        let mut value = MqlValue::series();
        let serie = Serie {
            metric: MetricId::new("temp", LabelSet::new()),
            points: vec![
                Point {
                    timestamp: 1,
                    value: 20.5,
                },
                Point {
                    timestamp: 2,
                    value: 21.0,
                },
            ],
        };
        value.series_add(&serie).unwrap();
        assert_eq!(value.to_string(), "temp{}\n    20.5 @1\n    21 @2\n");
        assert_eq!(MqlValue::scalar(7, 0.5).to_string(), "scalar: 0.5 @7\n");
    }
}
