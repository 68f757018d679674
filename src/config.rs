use std::collections::HashMap;
use std::time::Duration;

use crate::payload;
use crate::Error;

/// Prefix shared by every current environment variable name.
pub const ENV_PREFIX: &str = "BENCHMARK_LOGGING";

const MAX_LOG_COUNT: [&str; 2] = ["BENCHMARK_LOGGING_MAX_LOG_COUNT", "MAX_LOG_COUNT"];
const INTERVAL_MILLIS: [&str; 2] = ["BENCHMARK_LOGGING_INTERVAL_MILLIS", "LOGGING_INTERVAL_MILLS"];
const EVENT_NAME: &str = "BENCHMARK_LOGGING_EVENT_NAME";
// (field, variable, default)
const FIXED_FIELDS: [(&str, &str, &str); 2] = [
    ("myKey", "MY_VALUE", "myValue"),
    ("optionalKey", "OPTIONAL_VALUE", "optionalValue"),
];
const LEGACY_NAMES: [&str; 4] = [
    "MAX_LOG_COUNT",
    "LOGGING_INTERVAL_MILLS",
    "MY_VALUE",
    "OPTIONAL_VALUE",
];
const SINK: &str = "BENCHMARK_LOGGING_SINK";
const FLUENT_HOST: &str = "BENCHMARK_LOGGING_FLUENT_HOST";
const FLUENT_PORT: &str = "BENCHMARK_LOGGING_FLUENT_PORT";
const FLUENT_TAG: &str = "BENCHMARK_LOGGING_FLUENT_TAG";
const FLUENT_SUB_SECOND_PRECISION: &str = "BENCHMARK_LOGGING_FLUENT_SUB_SECOND_PRECISION";
const FLUENT_WRITE_TIMEOUT_MILLIS: &str = "BENCHMARK_LOGGING_FLUENT_WRITE_TIMEOUT_MILLIS";

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) max_iterations: u64,
    pub(crate) interval: Duration,
    pub(crate) event_name: String,
    pub(crate) fixed_fields: Vec<(String, String)>,
    pub(crate) payload_fields: Vec<(String, Option<String>)>,
    pub(crate) sink: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: u64::MAX,
            interval: Duration::from_millis(1000),
            event_name: "test-event".to_owned(),
            fixed_fields: FIXED_FIELDS
                .iter()
                .map(|(key, _, default)| (key.to_string(), default.to_string()))
                .collect(),
            payload_fields: Vec::new(),
            sink: SinkConfig::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Resolves the configuration from the process environment.
    ///
    /// A non-Unicode value is an error for any variable this crate reads; other
    /// non-Unicode entries are skipped.
    pub fn from_env() -> Result<Self, Error> {
        let mut vars = Vec::new();
        for (name, value) in std::env::vars_os() {
            let name = match name.into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            match value.into_string() {
                Ok(value) => vars.push((name, value)),
                Err(value) if is_option_name(&name) => {
                    return Err(Error::NotUnicode {
                        value: value.to_string_lossy().into_owned(),
                        name,
                    });
                }
                Err(_) => {}
            }
        }
        Self::from_vars(vars)
    }

    /// Resolves the configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let defaults = Config::default();

        let fixed_fields = FIXED_FIELDS
            .iter()
            .map(|(key, name, default)| {
                let value = vars.get(*name).map_or(*default, String::as_str);
                (key.to_string(), value.to_owned())
            })
            .collect();

        Ok(Self {
            max_iterations: parse_int(&vars, &MAX_LOG_COUNT)?.unwrap_or(defaults.max_iterations),
            interval: parse_int(&vars, &INTERVAL_MILLIS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            event_name: vars.get(EVENT_NAME).cloned().unwrap_or(defaults.event_name),
            fixed_fields,
            payload_fields: payload::discover(ENV_PREFIX, &vars),
            sink: SinkConfig::from_vars(&vars)?,
        })
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn payload_fields(&self) -> &[(String, Option<String>)] {
        &self.payload_fields
    }

    pub fn sink(&self) -> &SinkConfig {
        &self.sink
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn max_iterations(mut self, value: u64) -> Self {
        self.config.max_iterations = value;
        self
    }

    pub fn interval(mut self, value: Duration) -> Self {
        self.config.interval = value;
        self
    }

    pub fn event_name(mut self, value: impl Into<String>) -> Self {
        self.config.event_name = value.into();
        self
    }

    /// Sets a fixed field, replacing any earlier value for the same key.
    pub fn fixed_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        match self.config.fixed_fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.config.fixed_fields.push((key, value)),
        }
        self
    }

    pub fn payload_field(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.config.payload_fields.push((key.into(), value));
        self
    }

    pub fn sink(mut self, value: SinkConfig) -> Self {
        self.config.sink = value;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[derive(Debug, Clone, Default)]
pub enum SinkConfig {
    /// JSON lines on stdout.
    #[default]
    Stdout,
    /// Fluentd forward protocol over TCP.
    Fluent(FluentConfig),
}

impl SinkConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, Error> {
        match vars.get(SINK).map(String::as_str) {
            None | Some("stdout") => Ok(Self::Stdout),
            Some("fluent") => Ok(Self::Fluent(FluentConfig::from_vars(vars)?)),
            Some(other) => Err(Error::UnknownSink(other.to_owned())),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct FluentConfig {
    pub(crate) fluent_host: String,
    pub(crate) fluent_port: u16,
    pub(crate) tag: String,
    pub(crate) sub_second_precision: bool,
    pub(crate) write_timeout: Option<Duration>,
}

impl Default for FluentConfig {
    fn default() -> Self {
        Self {
            fluent_host: "127.0.0.1".to_owned(),
            fluent_port: 24224,
            tag: "benchmark.logging".to_owned(),
            sub_second_precision: false,
            write_timeout: None,
        }
    }
}

impl FluentConfig {
    pub fn builder() -> FluentConfigBuilder {
        FluentConfigBuilder {
            config: FluentConfig::default(),
        }
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, Error> {
        let defaults = FluentConfig::default();
        Ok(Self {
            fluent_host: vars.get(FLUENT_HOST).cloned().unwrap_or(defaults.fluent_host),
            fluent_port: parse_int(vars, &[FLUENT_PORT])?.unwrap_or(defaults.fluent_port),
            tag: vars.get(FLUENT_TAG).cloned().unwrap_or(defaults.tag),
            sub_second_precision: parse_bool(vars, FLUENT_SUB_SECOND_PRECISION)?
                .unwrap_or(defaults.sub_second_precision),
            write_timeout: parse_int(vars, &[FLUENT_WRITE_TIMEOUT_MILLIS])?
                .map(Duration::from_millis),
        })
    }

    pub fn host(&self) -> &str {
        &self.fluent_host
    }

    pub fn port(&self) -> u16 {
        self.fluent_port
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

pub struct FluentConfigBuilder {
    config: FluentConfig,
}

impl FluentConfigBuilder {
    pub fn fluent_host(mut self, value: impl Into<String>) -> Self {
        self.config.fluent_host = value.into();
        self
    }

    pub fn fluent_port(mut self, value: u16) -> Self {
        self.config.fluent_port = value;
        self
    }

    pub fn tag(mut self, value: impl Into<String>) -> Self {
        self.config.tag = value.into();
        self
    }

    pub fn sub_second_precision(mut self, value: bool) -> Self {
        self.config.sub_second_precision = value;
        self
    }

    pub fn write_timeout(mut self, value: Duration) -> Self {
        self.config.write_timeout = Some(value);
        self
    }

    pub fn build(self) -> FluentConfig {
        self.config
    }
}

fn is_option_name(name: &str) -> bool {
    name.starts_with(ENV_PREFIX) || LEGACY_NAMES.contains(&name)
}

// First name present wins, so current names shadow legacy ones.
fn lookup<'a>(
    vars: &'a HashMap<String, String>,
    names: &[&'static str],
) -> Option<(&'static str, &'a str)> {
    names
        .iter()
        .find_map(|name| vars.get(*name).map(|v| (*name, v.as_str())))
}

fn parse_int<T>(vars: &HashMap<String, String>, names: &[&'static str]) -> Result<Option<T>, Error>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    lookup(vars, names)
        .map(|(name, value)| {
            value.parse().map_err(|source| Error::InvalidInteger {
                name,
                value: value.to_owned(),
                source,
            })
        })
        .transpose()
}

fn parse_bool(vars: &HashMap<String, String>, name: &'static str) -> Result<Option<bool>, Error> {
    lookup(vars, &[name])
        .map(|(name, value)| {
            value.parse().map_err(|source| Error::InvalidBool {
                name,
                value: value.to_owned(),
                source,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.max_iterations(), u64::MAX);
        assert_eq!(config.interval(), Duration::from_millis(1000));
        assert_eq!(config.event_name(), "test-event");
        assert!(config.payload_fields().is_empty());
        assert_eq!(
            config.fixed_fields,
            vec![
                ("myKey".to_owned(), "myValue".to_owned()),
                ("optionalKey".to_owned(), "optionalValue".to_owned()),
            ]
        );
        assert!(matches!(config.sink(), SinkConfig::Stdout));
    }

    #[test]
    fn reads_current_names() {
        let config = Config::from_vars([
            ("BENCHMARK_LOGGING_MAX_LOG_COUNT", "3"),
            ("BENCHMARK_LOGGING_INTERVAL_MILLIS", "0"),
            ("BENCHMARK_LOGGING_EVENT_NAME", "order-created"),
            ("BENCHMARK_LOGGING_PAYLOAD_KEY1", "user"),
            ("BENCHMARK_LOGGING_PAYLOAD_VALUE1", "alice"),
        ])
        .unwrap();
        assert_eq!(config.max_iterations(), 3);
        assert_eq!(config.interval(), Duration::ZERO);
        assert_eq!(config.event_name(), "order-created");
        assert_eq!(
            config.payload_fields(),
            &[("user".to_owned(), Some("alice".to_owned()))]
        );
    }

    #[test]
    fn legacy_names_are_honoured_and_shadowed() {
        let config = Config::from_vars([
            ("MAX_LOG_COUNT", "5"),
            ("LOGGING_INTERVAL_MILLS", "250"),
            ("MY_VALUE", "mine"),
            ("OPTIONAL_VALUE", ""),
        ])
        .unwrap();
        assert_eq!(config.max_iterations(), 5);
        assert_eq!(config.interval(), Duration::from_millis(250));
        assert_eq!(
            config.fixed_fields,
            vec![
                ("myKey".to_owned(), "mine".to_owned()),
                ("optionalKey".to_owned(), String::new()),
            ]
        );

        let config = Config::from_vars([
            ("MAX_LOG_COUNT", "5"),
            ("BENCHMARK_LOGGING_MAX_LOG_COUNT", "7"),
        ])
        .unwrap();
        assert_eq!(config.max_iterations(), 7);
    }

    #[test]
    fn recognises_option_names() {
        assert!(is_option_name("BENCHMARK_LOGGING_MAX_LOG_COUNT"));
        assert!(is_option_name("BENCHMARK_LOGGING_PAYLOAD_VALUE3"));
        assert!(is_option_name("MAX_LOG_COUNT"));
        assert!(is_option_name("OPTIONAL_VALUE"));
        assert!(!is_option_name("PATH"));
    }

    #[test]
    fn fixed_field_builder_replaces_defaults() {
        let config = Config::builder().fixed_field("myKey", "mine").build();
        assert_eq!(
            config.fixed_fields,
            vec![
                ("myKey".to_owned(), "mine".to_owned()),
                ("optionalKey".to_owned(), "optionalValue".to_owned()),
            ]
        );
    }

    #[test]
    fn malformed_integer_names_the_variable() {
        let err = Config::from_vars([("BENCHMARK_LOGGING_INTERVAL_MILLIS", "abc")]).unwrap_err();
        match err {
            Error::InvalidInteger { name, value, .. } => {
                assert_eq!(name, "BENCHMARK_LOGGING_INTERVAL_MILLIS");
                assert_eq!(value, "abc");
            }
            e => panic!("unexpected error: {}", e),
        }

        assert!(matches!(
            Config::from_vars([("MAX_LOG_COUNT", "-1")]),
            Err(Error::InvalidInteger { .. })
        ));
        assert!(matches!(
            Config::from_vars([("MAX_LOG_COUNT", " 3")]),
            Err(Error::InvalidInteger { .. })
        ));
    }

    #[test]
    fn fluent_sink_settings() {
        let config = Config::from_vars([
            ("BENCHMARK_LOGGING_SINK", "fluent"),
            ("BENCHMARK_LOGGING_FLUENT_HOST", "fluentd.logging.svc"),
            ("BENCHMARK_LOGGING_FLUENT_PORT", "24225"),
            ("BENCHMARK_LOGGING_FLUENT_SUB_SECOND_PRECISION", "true"),
            ("BENCHMARK_LOGGING_FLUENT_WRITE_TIMEOUT_MILLIS", "500"),
        ])
        .unwrap();
        match config.sink() {
            SinkConfig::Fluent(fluent) => {
                assert_eq!(fluent.host(), "fluentd.logging.svc");
                assert_eq!(fluent.port(), 24225);
                assert_eq!(fluent.tag(), "benchmark.logging");
                assert!(fluent.sub_second_precision);
                assert_eq!(fluent.write_timeout, Some(Duration::from_millis(500)));
            }
            other => panic!("unexpected sink: {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_sink_settings() {
        assert!(matches!(
            Config::from_vars([("BENCHMARK_LOGGING_SINK", "syslog")]),
            Err(Error::UnknownSink(s)) if s == "syslog"
        ));
        assert!(matches!(
            Config::from_vars([
                ("BENCHMARK_LOGGING_SINK", "fluent"),
                ("BENCHMARK_LOGGING_FLUENT_PORT", "70000"),
            ]),
            Err(Error::InvalidInteger { .. })
        ));
        assert!(matches!(
            Config::from_vars([
                ("BENCHMARK_LOGGING_SINK", "fluent"),
                ("BENCHMARK_LOGGING_FLUENT_SUB_SECOND_PRECISION", "yes"),
            ]),
            Err(Error::InvalidBool { .. })
        ));
    }
}
