use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::MemberId;

pub const DEFAULT_MEMBER_LIMIT: u32 = 100;
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 20;
pub const DEFAULT_RANK_CHANGE_REASON: &str = "Changed via Discord Bot";
pub const RANK_CHANGE_ATTRIBUTION: &str = "Discord Bot";
/// Attribution used for activity logs when no user id is given.
pub const BOT_IDENTITY: &str = "Cortex";

/// A member as returned by the TF System (search matches, member details).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "numeric_id")]
    pub id: i64,
    /// Empty when the service has no rank on record.
    #[serde(default, deserialize_with = "nullable_text")]
    pub current_rank: String,
    #[serde(default)]
    pub discord_username: Option<String>,
    #[serde(default)]
    pub roblox_username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    pub fn member_id(&self) -> MemberId {
        MemberId(self.id)
    }

    /// Best display name: platform-A username, then platform-B, then the id.
    pub fn display_name(&self) -> String {
        self.discord_username
            .as_deref()
            .or(self.roblox_username.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

// Ids arrive as numbers or numeric strings.
fn numeric_id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("member id {n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("member id {s:?} is not numeric"))),
        other => Err(de::Error::custom(format!("member id {other} is not numeric"))),
    }
}

fn nullable_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activity_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankInfo {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============== Query Parameters ==============

/// Which username field `GET /members/search` should match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchField {
    DiscordUsername,
    RobloxUsername,
    #[default]
    Both,
}

impl SearchField {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::DiscordUsername => "discord_username",
            SearchField::RobloxUsername => "roblox_username",
            SearchField::Both => "both",
        }
    }
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discord_username" | "discord" => Ok(SearchField::DiscordUsername),
            "roblox_username" | "roblox" => Ok(SearchField::RobloxUsername),
            "both" => Ok(SearchField::Both),
            other => Err(format!(
                "unknown search field '{other}' (expected discord_username, roblox_username or both)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberQuery {
    pub search: Option<String>,
    pub rank: Option<String>,
    pub limit: Option<u32>,
}

impl Default for MemberQuery {
    fn default() -> Self {
        Self {
            search: None,
            rank: None,
            limit: Some(DEFAULT_MEMBER_LIMIT),
        }
    }
}

impl MemberQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(s) = self.search.as_deref().filter(|s| !s.is_empty()) {
            out.push(("search".to_string(), s.to_string()));
        }
        if let Some(r) = self.rank.as_deref().filter(|r| !r.is_empty()) {
            out.push(("rank".to_string(), r.to_string()));
        }
        if let Some(l) = self.limit.filter(|l| *l > 0) {
            out.push(("limit".to_string(), l.to_string()));
        }
        out
    }
}

// ============== Activity Types ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Raid,
    Patrol,
    Training,
    Mission,
    Tryout,
}

impl ActivityType {
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Raid,
        ActivityType::Patrol,
        ActivityType::Training,
        ActivityType::Mission,
        ActivityType::Tryout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Raid => "Raid",
            ActivityType::Patrol => "Patrol",
            ActivityType::Training => "Training",
            ActivityType::Mission => "Mission",
            ActivityType::Tryout => "Tryout",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names = ActivityType::ALL.map(ActivityType::as_str).join(", ");
                format!("unknown activity type '{s}' (expected one of: {names})")
            })
    }
}

// ============== Request Bodies ==============

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RankChangeBody<'a> {
    pub rank: &'a str,
    pub reason: &'a str,
    pub promoted_by: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_user_id: Option<&'a str>,
}

/// Input for `POST /members`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewMember {
    pub discord_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roblox_username: Option<String>,
    pub current_rank: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_user_id: Option<String>,
}

impl NewMember {
    /// A new member at the lowest rank.
    pub fn new(discord_username: impl Into<String>) -> Self {
        Self {
            discord_username: discord_username.into(),
            roblox_username: None,
            current_rank: crate::rank::Rank::LOWEST.name().to_string(),
            discord_user_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RemoveMemberBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_user_id: Option<&'a str>,
}

/// Input for `POST /activity`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewActivity {
    pub member_id: MemberId,
    pub activity_type: ActivityType,
    pub description: Option<String>,
    /// `None` lets the service default to today.
    pub activity_date: Option<NaiveDate>,
    /// Attribution; defaults to [`BOT_IDENTITY`].
    pub logged_by: String,
}

impl NewActivity {
    pub fn new(member_id: MemberId, activity_type: ActivityType) -> Self {
        Self {
            member_id,
            activity_type,
            description: None,
            activity_date: None,
            logged_by: BOT_IDENTITY.to_string(),
        }
    }

    pub(crate) fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("member_id".to_string(), Value::from(self.member_id.0));
        body.insert(
            "activity_type".to_string(),
            Value::from(self.activity_type.as_str()),
        );
        if let Some(d) = self.description.as_deref().filter(|d| !d.is_empty()) {
            body.insert("description".to_string(), Value::from(d));
        }
        if let Some(date) = self.activity_date {
            body.insert(
                "activity_date".to_string(),
                Value::from(date.format("%Y-%m-%d").to_string()),
            );
        }
        if !self.logged_by.is_empty() {
            body.insert(
                "discord_user_id".to_string(),
                Value::from(self.logged_by.as_str()),
            );
        }
        Value::Object(body)
    }
}
