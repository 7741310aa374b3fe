use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time health of one registered provider. Recomputed on demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub provider: String,
    pub reachable: bool,
    pub last_checked: DateTime<Utc>,
    /// Requests issued through the provider's rate limiter so far.
    pub request_count: u64,
    pub requests_per_minute: u32,
}
