use crate::config::FluentConfig;
use crate::payload::Event;
use crate::sink::EventSink;
use crate::Error;

/// Sends events to Fluentd (or Fluent Bit) using the forward protocol's Message mode.
#[derive(Debug)]
pub struct FluentSink {
    stream: tokio::net::TcpStream,
    config: FluentConfig,
}

impl FluentSink {
    pub async fn connect(config: FluentConfig) -> std::io::Result<Self> {
        let stream =
            tokio::net::TcpStream::connect((config.fluent_host.as_str(), config.fluent_port))
                .await?;
        tracing::debug!(
            host = %config.fluent_host,
            port = config.fluent_port,
            "connected to fluent forward input"
        );
        Ok(Self { stream, config })
    }

    pub async fn post_with_time<Tz>(
        &self,
        time: chrono::DateTime<Tz>,
        event: &Event,
    ) -> Result<(), Error>
    where
        Tz: chrono::TimeZone,
    {
        let message = self.encode_data(time, event)?;
        self.write(message).await
    }

    fn encode_data<Tz>(
        &self,
        time: chrono::DateTime<Tz>,
        event: &Event,
    ) -> Result<bytes::Bytes, rmp_serde::encode::Error>
    where
        Tz: chrono::TimeZone,
    {
        use bytes::BufMut as _;
        use serde::Serialize as _;

        let tag = self.config.tag.as_str();
        let record = event.record();
        let mut writer = bytes::BytesMut::new().writer();
        let mut serializer = rmp_serde::Serializer::new(&mut writer).with_struct_map();
        if self.config.sub_second_precision {
            (tag, EventTime(time), record).serialize(&mut serializer)?;
        } else {
            (tag, time.timestamp(), record).serialize(&mut serializer)?;
        }
        Ok(writer.into_inner().freeze())
    }

    async fn write(&self, message: bytes::Bytes) -> Result<(), Error> {
        if let Some(d) = self.config.write_timeout {
            tokio::time::timeout(d, self.write_all(message))
                .await
                .map_err(|_| Error::WriteTimeout(d))??;
        } else {
            self.write_all(message).await?;
        }
        Ok(())
    }

    async fn write_all(&self, mut message: bytes::Bytes) -> std::io::Result<()> {
        use bytes::Buf as _;

        while message.has_remaining() {
            self.stream.writable().await?;
            match self.stream.try_write(&message) {
                Ok(n) => message.advance(n),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventSink for FluentSink {
    async fn emit(&self, event: &Event) -> Result<(), Error> {
        self.post_with_time(chrono::Utc::now(), event).await
    }
}

#[derive(Debug)]
struct EventTime<Tz>(chrono::DateTime<Tz>)
where
    Tz: chrono::TimeZone;

impl<Tz> serde::Serialize for EventTime<Tz>
where
    Tz: chrono::TimeZone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use bytes::BufMut as _;
        use serde::ser::Error as _;

        // https://github.com/fluent/fluentd/wiki/Forward-Protocol-Specification-v1#eventtime-ext-format
        const EVENT_TIME_TYPE: i8 = 0x00;
        let seconds: u32 = self.0.timestamp().try_into().map_err(|_| {
            S::Error::custom("EventTime can only carry timestamps in the unsigned 32-bit range")
        })?;
        let mut buf = bytes::BytesMut::new();
        buf.put_u32(seconds);
        buf.put_u32(self.0.timestamp_subsec_nanos());
        serializer
            .serialize_newtype_struct(rmp_serde::MSGPACK_EXT_STRUCT_NAME, &(EVENT_TIME_TYPE, buf))
    }
}
