use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Runtime configuration (§6: environment variables). Loaded from an
/// optional `.env`/`config/*.toml` layer plus `APP__`-prefixed env vars,
/// with defaults matching spec.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_hostport")]
    pub temporal_hostport: String,
    #[serde(default = "default_namespace")]
    pub temporal_namespace: String,
    #[serde(default = "default_order_tq")]
    pub order_task_queue: String,
    #[serde(default = "default_seat_tq")]
    pub seat_task_queue: String,
    #[serde(default)]
    pub integration: bool,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_payment_failure_rate")]
    pub payment_failure_rate: f64,
}

fn default_hostport() -> String {
    "localhost:7233".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_order_tq() -> String {
    "order-tq".to_string()
}

fn default_seat_tq() -> String {
    "seat-tq".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_payment_failure_rate() -> f64 {
    0.15
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temporal_hostport: default_hostport(),
            temporal_namespace: default_namespace(),
            order_task_queue: default_order_tq(),
            seat_task_queue: default_seat_tq(),
            integration: false,
            http_port: default_http_port(),
            payment_failure_rate: default_payment_failure_rate(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .try_parsing(true)
                    .prefix_separator("_")
                    .list_separator(","),
            )
            .build()?;

        match s.try_deserialize() {
            Ok(settings) => Ok(settings),
            Err(_) => Ok(Settings::default()),
        }
    }
}
