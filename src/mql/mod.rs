//! Query-side values and the literal grammars shared with the configuration layer.

pub mod util;
mod value;

pub use self::util::{is_label_name, is_metric_name, parse_duration, unquote};
pub use self::value::{MetricId, MqlValue, Point, Sample, Serie};
