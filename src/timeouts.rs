//! Timeout configuration for requests.
//!
//! - **connect**: dial + TLS handshake (and proxy tunnel setup)
//! - **ttfb**: request sent until response headers received
//! - **total**: absolute deadline for the whole request, body included
//!
//! ```rust,ignore
//! use guise::{Client, Timeouts};
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .timeouts(Timeouts::api_defaults())
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timeout configuration. `None` means no limit for that phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Deadline for establishing a connection. Does not reset.
    #[serde(with = "opt_secs")]
    pub connect: Option<Duration>,

    /// Time-to-first-byte: request sent until response headers arrive.
    ///
    /// Detects servers that accept connections but hang before responding.
    #[serde(with = "opt_secs")]
    pub ttfb: Option<Duration>,

    /// Absolute deadline covering connect, request and buffered response.
    #[serde(with = "opt_secs")]
    pub total: Option<Duration>,
}

impl Timeouts {
    /// All limits disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for normal API calls.
    ///
    /// - connect: 10s
    /// - ttfb: 30s
    /// - total: 120s
    pub fn api_defaults() -> Self {
        Self {
            connect: Some(Duration::from_secs(10)),
            ttfb: Some(Duration::from_secs(30)),
            total: Some(Duration::from_secs(120)),
        }
    }

    pub fn connect(mut self, timeout: Duration) -> Self {
        self.connect = Some(timeout);
        self
    }

    pub fn ttfb(mut self, timeout: Duration) -> Self {
        self.ttfb = Some(timeout);
        self
    }

    pub fn total(mut self, timeout: Duration) -> Self {
        self.total = Some(timeout);
        self
    }
}

/// Run `fut` under an optional deadline, mapping expiry with `on_timeout`.
pub(crate) async fn with_timeout<F, T>(
    limit: Option<Duration>,
    on_timeout: fn(Duration) -> Error,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| on_timeout(d))?,
        None => fut.await,
    }
}

/// Durations in config files are fractional seconds.
mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        match secs {
            Some(s) if s.is_finite() && s >= 0.0 => Ok(Some(Duration::from_secs_f64(s))),
            Some(s) => Err(serde::de::Error::custom(format!("invalid timeout {}", s))),
            None => Ok(None),
        }
    }
}
