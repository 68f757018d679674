//! Emits structured log events at a configurable rate and shape, for exercising a
//! log-collection pipeline.
//!
//! Everything is driven by environment variables (see [`Config::from_env`]). Events are
//! written through an [`EventSink`]: JSON lines on stdout, or the Fluentd forward protocol.

mod config;
mod emitter;
mod fluent;
mod payload;
mod sink;

pub use config::{Config, ConfigBuilder, FluentConfig, FluentConfigBuilder, SinkConfig, ENV_PREFIX};
pub use emitter::{build_payload, run};
pub use fluent::FluentSink;
pub use payload::{discover, Event, Payload, Record, Value, EVENT_VERSION};
pub use sink::{EventSink, JsonLinesSink};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid integer in {name}: {value:?}: {source}")]
    InvalidInteger {
        name: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },
    #[error("invalid boolean in {name}: {value:?}: {source}")]
    InvalidBool {
        name: &'static str,
        value: String,
        source: std::str::ParseBoolError,
    },
    #[error("{name} is not valid Unicode: {value:?}")]
    NotUnicode { name: String, value: String },
    #[error("unknown sink {0:?}, expected \"stdout\" or \"fluent\"")]
    UnknownSink(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),
}
