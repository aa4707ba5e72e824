use chrono::{DateTime, Utc};

/// One poll cycle's answer to "is the account live right now?".
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStatus {
    pub is_live: bool,
    pub observed_at: DateTime<Utc>,
    pub title: Option<String>,
    /// False when this is the last known value re-sent after a failed query.
    pub fresh: bool,
}

impl LiveStatus {
    pub fn fresh(is_live: bool, title: Option<String>) -> Self {
        Self {
            is_live,
            observed_at: Utc::now(),
            title,
            fresh: true,
        }
    }

    pub fn last_known(is_live: bool) -> Self {
        Self {
            is_live,
            observed_at: Utc::now(),
            title: None,
            fresh: false,
        }
    }
}

/// An active broadcast as reported by the streaming API.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub id: String,
    pub title: String,
    pub life_cycle_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

impl Visibility {
    pub fn from_live(is_live: bool) -> Self {
        if is_live { Visibility::Visible } else { Visibility::Hidden }
    }

    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}
