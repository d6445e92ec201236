use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(rename = "ip")]
    pub address: String,

    /// Failures inside the window that started at `first_attempt`
    pub attempts: u32,

    pub first_attempt: DateTime<Utc>,

    pub last_attempt: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

impl Model {
    #[must_use]
    pub fn first_failure(address: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            attempts: 1,
            first_attempt: now,
            last_attempt: now,
            blocked_until: None,
        }
    }

    #[must_use]
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    #[must_use]
    pub fn block_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until <= now)
    }
}

impl Record for Model {
    fn key(&self) -> &str {
        &self.address
    }
}
