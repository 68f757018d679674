use std::collections::{BTreeMap, HashMap};

/// A single payload field value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(u64),
    Text(String),
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Null, Self::Text)
    }
}

/// Field mapping attached to a structured event.
pub type Payload = BTreeMap<String, Value>;

/// Schema version stamped on every emitted record.
pub const EVENT_VERSION: u32 = 1;

/// A named structured event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Flat record view: the `event_version` marker, the event name under `message`, then the payload.
    pub fn record(&self) -> Record<'_> {
        Record {
            event_version: EVENT_VERSION,
            message: &self.name,
            fields: &self.payload,
        }
    }
}

#[derive(Debug)]
pub struct Record<'a> {
    pub event_version: u32,
    pub message: &'a str,
    pub fields: &'a Payload,
}

const RESERVED_KEYS: [&str; 2] = ["event_version", "message"];

/// Whether `key` names a marker field that payload fields are never allowed to replace.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// rmp-serde needs the map length up front, so this cannot use `#[serde(flatten)]`.
impl serde::Serialize for Record<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap as _;

        let fields = || {
            self.fields
                .iter()
                .filter(|(k, _)| !is_reserved_key(k))
        };
        let mut map = serializer.serialize_map(Some(fields().count() + RESERVED_KEYS.len()))?;
        map.serialize_entry("event_version", &self.event_version)?;
        map.serialize_entry("message", self.message)?;
        for (k, v) in fields() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Collects `<prefix>_PAYLOAD_KEY<N>` / `<prefix>_PAYLOAD_VALUE<N>` pairs in index order.
///
/// Only the contiguous run of indices starting at 1 is taken; anything after the
/// first missing index is ignored. A key without a matching value yields `None`.
/// Keys that collide with a marker field are kept but logged, since the record drops them.
pub fn discover(prefix: &str, vars: &HashMap<String, String>) -> Vec<(String, Option<String>)> {
    let key_prefix = format!("{}_PAYLOAD_KEY", prefix);
    let value_prefix = format!("{}_PAYLOAD_VALUE", prefix);

    let mut indexed: Vec<(u32, &str)> = vars
        .iter()
        .filter_map(|(name, key)| {
            let index = parse_index(name.strip_prefix(key_prefix.as_str())?)?;
            Some((index, key.as_str()))
        })
        .collect();
    indexed.sort_unstable_by_key(|(index, _)| *index);

    let mut fields = Vec::with_capacity(indexed.len());
    let mut expected = 1;
    for (index, key) in indexed {
        if index != expected {
            tracing::warn!(
                index,
                missing = expected,
                "ignoring payload keys after a gap in the numbering"
            );
            break;
        }
        if is_reserved_key(key) {
            tracing::warn!(
                index,
                key,
                "payload key collides with a marker field and will not be emitted"
            );
        }
        let value = vars.get(&format!("{}{}", value_prefix, index)).cloned();
        fields.push((key.to_owned(), value));
        expected += 1;
    }
    fields
}

// Canonical decimal only: "01" or "+1" would never be found by probing KEY1, KEY2, ...
fn parse_index(suffix: &str) -> Option<u32> {
    if suffix.is_empty() || suffix.starts_with('0') || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
