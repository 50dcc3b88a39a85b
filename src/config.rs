use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_FIELD_MANAGER: &str = "myappresource-controller";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches every namespace.
    pub watch_namespace: Option<String>,
    pub requeue_after: Duration,
    pub error_requeue: Duration,
    pub request_timeout: Duration,
    pub field_manager: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            requeue_after: Duration::from_secs(300),
            error_requeue: Duration::from_secs(60),
            request_timeout: crate::context::DEFAULT_REQUEST_TIMEOUT,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()) {
            config.watch_namespace = Some(val);
        }

        if let Some(val) = lookup("REQUEUE_AFTER_SECS") {
            config.requeue_after = parse_secs("REQUEUE_AFTER_SECS", &val)?;
        }

        if let Some(val) = lookup("ERROR_REQUEUE_SECS") {
            config.error_requeue = parse_secs("ERROR_REQUEUE_SECS", &val)?;
        }

        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("REQUEST_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = lookup("FIELD_MANAGER").filter(|v| !v.is_empty()) {
            config.field_manager = val;
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, val: &str) -> Result<Duration> {
    val.trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidConfig(format!("Invalid {key}: {val:?}")))
}
