use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ResumeId, UserId};

/// A stored resume. Only `content_text` matters to the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    pub id: ResumeId,
    pub user_id: UserId,
    pub title: String,
    pub content_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    pub fn new(user_id: UserId, title: impl Into<String>, content_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ResumeId::new(),
            user_id,
            title: title.into(),
            content_text: content_text.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
