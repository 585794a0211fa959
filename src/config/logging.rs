use serde::Deserialize;

/// Third-party crates only speak up at `warn`; `RUST_LOG` replaces this wholesale.
const DEFAULT_FILTER: &str = "warn,forgegate=info,forgegate_adapter=info";

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// One JSON object per event, for log shippers.
    #[serde(default)]
    pub json: bool,
    /// OTLP/HTTP collector for request spans. `OTEL_EXPORTER_OTLP_ENDPOINT`
    /// fills it in when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl LoggingConfig {
    fn default_level() -> String {
        DEFAULT_FILTER.to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            otlp_endpoint: None,
        }
    }
}
