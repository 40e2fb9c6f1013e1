use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model_api: ModelApiConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    pub source: SourceConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelApiConfig {
    pub host: String,
    pub port: u16,
}

impl ModelApiConfig {
    pub fn get_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct StreamConfig {
    #[serde(default = "default_fps")]
    pub fps: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_result_poll_ms")]
    pub result_poll_ms: u64,
    #[serde(default = "default_report_every")]
    pub report_every: u64,
}

fn default_fps() -> u64 {
    10
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_result_poll_ms() -> u64 {
    500
}

fn default_report_every() -> u64 {
    50
}

fn fps_to_delay_ms(fps: u64) -> u64 {
    ((1000.0 / fps.max(1) as f64).round() as u64).max(1)
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            jpeg_quality: default_jpeg_quality(),
            request_timeout_ms: default_request_timeout_ms(),
            result_poll_ms: default_result_poll_ms(),
            report_every: default_report_every(),
        }
    }
}

impl StreamConfig {
    pub fn get_frame_interval(&self) -> Duration {
        Duration::from_millis(fps_to_delay_ms(self.fps))
    }

    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn get_result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Camera,
    Video,
    Directory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub camera_index: i32,
    pub video_path: Option<PathBuf>,
    pub image_dir: Option<PathBuf>,
    #[serde(default = "default_repeat")]
    pub repeat: bool,
}

fn default_repeat() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no working directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("WC")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_to_delay() {
        assert_eq!(fps_to_delay_ms(10), 100);
        assert_eq!(fps_to_delay_ms(30), 33);
        assert_eq!(fps_to_delay_ms(0), 1000);
        assert_eq!(fps_to_delay_ms(3000), 1);
    }

    #[test]
    fn test_high_fps_never_yields_zero_interval() {
        let stream = StreamConfig {
            fps: 3000,
            ..StreamConfig::default()
        };
        assert_eq!(stream.get_frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_stream_defaults() {
        let stream = StreamConfig::default();

        assert_eq!(stream.get_frame_interval(), Duration::from_millis(100));
        assert_eq!(stream.get_request_timeout(), Duration::from_secs(5));
        assert_eq!(stream.jpeg_quality, 80);
        assert_eq!(stream.report_every, 50);
    }

    #[test]
    fn test_model_api_address() {
        let api = ModelApiConfig {
            host: "localhost".to_string(),
            port: 8000,
        };
        assert_eq!(api.get_address(), "http://localhost:8000");
    }
}
