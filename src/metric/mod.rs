//! The metric data model: label sets identifying series, state sets, typed values and metric
//! families. Families are read from the text exposition format by [`MetricParser`] and
//! selected with [`MetricMatch`].

mod family;
mod histogram;
mod label_set;
mod matcher;
mod parser;
mod state_set;

pub use self::family::{
    Counter, Gauge, Metric, MetricFamily, MetricFamilyDispatcher, MetricType, Value,
};
pub use self::histogram::{Bucket, Histogram, Quantile, Summary};
pub use self::label_set::{AddStatus, LabelPair, LabelPairRef, LabelSet, LabelSetRef};
pub use self::matcher::{MatchOp, MatchPair, MetricMatch};
pub use self::parser::{LineStatus, MetricParser};
pub use self::state_set::{State, StateSet};
