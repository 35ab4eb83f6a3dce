//! Engine configuration.

use crate::{error::Result, Error};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, usually loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the remote API
    pub remote_url: String,
    /// Resource path under the base URL
    pub resource: String,
    /// Health endpoint polled by the reachability probe
    pub health_url: String,
    /// Directory holding the durable store
    pub data_dir: PathBuf,
    /// Timeout for every remote call
    pub timeout: Duration,
    /// Probe interval; `None` disables the probe
    pub probe_interval: Option<Duration>,
    /// Records created by an offline batch request
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_url: "http://localhost:3000/api".to_string(),
            resource: "contacts".to_string(),
            health_url: "http://localhost:3000/health".to_string(),
            data_dir: PathBuf::from("./offsync-data"),
            timeout: Duration::from_secs(30),
            probe_interval: Some(Duration::from_secs(5)),
            batch_size: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `OFFSYNC_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let remote_url = env::var("OFFSYNC_REMOTE_URL").unwrap_or(defaults.remote_url);
        let resource = env::var("OFFSYNC_RESOURCE").unwrap_or(defaults.resource);
        let health_url = env::var("OFFSYNC_HEALTH_URL").unwrap_or(defaults.health_url);
        let data_dir = env::var("OFFSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let timeout = match parse_var::<u64>("OFFSYNC_TIMEOUT_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let probe_interval = match parse_var::<u64>("OFFSYNC_PROBE_INTERVAL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.probe_interval,
        };

        let batch_size = parse_var("OFFSYNC_BATCH_SIZE")?.unwrap_or(defaults.batch_size);

        Ok(Self {
            remote_url,
            resource,
            health_url,
            data_dir,
            timeout,
            probe_interval,
            batch_size,
        })
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = url.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_interval(mut self, interval: Option<Duration>) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid {name} value: {raw:?}"))),
        Err(_) => Ok(None),
    }
}
