use crate::config::Config;
use crate::payload::{Event, Payload, Value};
use crate::sink::EventSink;
use crate::Error;

/// Builds the payload for iteration `count`.
///
/// Field precedence, lowest first: `count`, the fixed fields, then the discovered fields.
pub fn build_payload(config: &Config, count: u64) -> Payload {
    let mut payload = Payload::new();
    payload.insert("count".to_owned(), Value::from(count));
    for (key, value) in &config.fixed_fields {
        payload.insert(key.clone(), Value::from(value.as_str()));
    }
    for (key, value) in &config.payload_fields {
        payload.insert(key.clone(), Value::from(value.clone()));
    }
    payload
}

/// Emits events until `config.max_iterations` is reached and returns how many were written.
///
/// Each iteration sends one structured event to `sink`, logs a `main: <n>` diagnostic line,
/// then sleeps for `config.interval` unless it was the last one. The first sink error ends
/// the loop.
pub async fn run<S>(config: &Config, sink: &S) -> Result<u64, Error>
where
    S: EventSink + ?Sized,
{
    tracing::debug!(
        max_iterations = config.max_iterations,
        interval_ms = config.interval.as_millis() as u64,
        event_name = %config.event_name,
        payload_fields = config.payload_fields.len(),
        "starting event loop"
    );

    let mut count: u64 = 0;
    while count < config.max_iterations {
        count += 1;
        let event = Event::new(config.event_name.as_str(), build_payload(config, count));
        sink.emit(&event).await?;
        tracing::info!("main: {}", count);
        // No sleep after the last event, so a bounded run exits as soon as it is done.
        if count < config.max_iterations {
            tokio::time::sleep(config.interval).await;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovered_fields_override_fixed_ones() {
        let config = Config::builder()
            .fixed_field("myKey", "myValue")
            .payload_field("myKey", Some("override".to_owned()))
            .payload_field("count", None)
            .build();
        let payload = build_payload(&config, 7);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload["myKey"], Value::from("override"));
        assert_eq!(payload["optionalKey"], Value::from("optionalValue"));
        assert_eq!(payload["count"], Value::Null);
    }

    #[test]
    fn payload_is_rebuilt_per_iteration() {
        let config = Config::builder().payload_field("user", None).build();
        assert_eq!(build_payload(&config, 1)["count"], Value::Number(1));
        assert_eq!(build_payload(&config, 2)["count"], Value::Number(2));
    }
}
