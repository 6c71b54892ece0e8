//! Audit record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One request as seen by the audit trail.
///
/// `status` and `latency_ms` are empty while the record is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "record", rename_all = "lowercase")]
pub enum AuditEvent {
    Opened(AuditRecord),
    Closed(AuditRecord),
}

impl AuditEvent {
    pub fn record(&self) -> &AuditRecord {
        match self {
            Self::Opened(record) | Self::Closed(record) => record,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}
