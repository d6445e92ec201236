use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,

    /// Not validated against the users collection on write.
    pub user_id: String,

    pub token: String,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl Model {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Sessions are keyed by their token: one token maps to exactly one session.
impl Record for Model {
    fn key(&self) -> &str {
        &self.token
    }
}
