//! Core libraries of a collectd-family metrics daemon.
//!
//! - [`metric`]: label sets, state sets, histograms and metric families
//! - [`config`]: the configuration file parser and its typed getters
//! - [`xson`]: a streaming JSON parser with a value tree
//! - [`mdb`]: the checksummed append-only record store
//! - [`mql`]: query values and the duration and name grammars
//!
//! With the default `serde` feature the config tree can be deserialized into plain structs with
//! [`de::from_config`], and the metric model implements `Serialize`.

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

mod buf;
mod cdtime;
pub mod config;
#[cfg(feature = "serde")]
pub mod de;
mod errors;
pub mod logger;
pub mod mdb;
pub mod metric;
pub mod mql;
#[cfg(feature = "serde")]
mod ser;
pub mod xson;

pub use crate::buf::StrBuf;
pub use crate::cdtime::CdTime;
pub use crate::errors::*;
pub use crate::logger::{LogLevel, LoggerBuilder};
