//! QueueConfig - queue と各ループの設定
//!
//! 明示的に渡す。グローバル状態は持たない。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// # 使用例
/// ```ignore
/// let config = QueueConfig::new("/var/lib/courier")
///     .with_poll_interval(Duration::from_millis(100))
///     .with_lease(Duration::from_secs(60));
/// ```
///
/// TOML からも読める（duration はミリ秒）:
/// ```toml
/// root = "/var/lib/courier"
/// poll_interval_ms = 100
/// lease_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub root: PathBuf,
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    #[serde(rename = "response_timeout_ms", with = "millis")]
    pub response_timeout: Duration,
    #[serde(rename = "lease_ms", with = "millis")]
    pub lease: Duration,
    #[serde(rename = "retention_ms", with = "millis")]
    pub retention: Duration,
    #[serde(rename = "sweep_interval_ms", with = "millis")]
    pub sweep_interval: Duration,
    #[serde(rename = "gc_interval_ms", with = "millis")]
    pub gc_interval: Duration,
    /// pending の処理順に item の `priority` を使う（高い順）
    pub honor_priority: bool,
    /// 処理結果を response artifact としても書く
    pub publish_responses: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("queue"),
            poll_interval: Duration::from_millis(500),
            response_timeout: Duration::from_secs(30),
            lease: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(30),
            gc_interval: Duration::from_secs(60 * 60),
            honor_priority: false,
            publish_responses: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0} must be greater than zero")]
    Zero(&'static str),
}

impl QueueConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// ゼロ間隔のループは busy loop になるので弾く
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("poll_interval", self.poll_interval),
            ("lease", self.lease),
            ("sweep_interval", self.sweep_interval),
            ("gc_interval", self.gc_interval),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_honor_priority(mut self, honor_priority: bool) -> Self {
        self.honor_priority = honor_priority;
        self
    }

    pub fn with_publish_responses(mut self, publish_responses: bool) -> Self {
        self.publish_responses = publish_responses;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
