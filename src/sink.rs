use tokio::io::AsyncWriteExt as _;

use crate::config::SinkConfig;
use crate::fluent::FluentSink;
use crate::payload::{Event, Record};
use crate::Error;

/// Destination for structured events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &Event) -> Result<(), Error>;
}

impl SinkConfig {
    /// Opens the sink this configuration selects.
    pub async fn connect(&self) -> Result<Box<dyn EventSink>, Error> {
        Ok(match self {
            SinkConfig::Stdout => Box::new(JsonLinesSink::stdout()),
            SinkConfig::Fluent(config) => Box::new(FluentSink::connect(config.clone()).await?),
        })
    }
}

#[derive(serde::Serialize)]
struct TimestampedRecord<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(flatten)]
    record: Record<'a>,
}

/// Writes one JSON object per event, newline-delimited.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: tokio::sync::Mutex<W>,
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait::async_trait]
impl<W> EventSink for JsonLinesSink<W>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    async fn emit(&self, event: &Event) -> Result<(), Error> {
        let mut line = serde_json::to_vec(&TimestampedRecord {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            record: event.record(),
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
