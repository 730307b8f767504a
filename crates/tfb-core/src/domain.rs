use std::fmt;

/// TF System member id (numeric, assigned by the remote service).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberId(pub i64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External chat-platform user id (opaque string, e.g. a Discord snowflake).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whoever initiates a command.
///
/// `rank` is only consulted by permission-checked operations; when absent the
/// check is skipped and the remote service has the final word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub rank: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, rank: Option<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            rank,
        }
    }
}
