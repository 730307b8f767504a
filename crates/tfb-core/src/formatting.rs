//! Rendering of API envelopes as chat markdown.

use serde_json::Value;

use crate::{
    api::{
        types::{Activity, Member},
        ApiResult, ErrorKind,
    },
    commands::Command,
};

/// Max list entries shown in one reply.
const MAX_LIST_ITEMS: usize = 25;

/// Render a command result for chat.
pub fn render(cmd: &Command, result: &ApiResult) -> String {
    if !result.success {
        return render_failure(result);
    }

    match cmd {
        Command::Help => result.display_message(),
        Command::Status => with_header("🟢 **TF System status**", &scalar_fields(result)),
        Command::Verify => format!("✅ {}", message_or(result, "API key verified.")),
        Command::Members { .. } => {
            let members = members_in(result, "members");
            render_members("👥 **Members**", &members, result)
        }
        Command::Search { name, .. } => {
            let matches = members_in(result, "matches");
            if matches.is_empty() {
                return format!("🔍 No members found matching **{name}**.");
            }
            render_members(&format!("🔍 **Matches for {name}**"), &matches, result)
        }
        Command::Member { id } => {
            let Some(member) = result.field::<Member>("member") else {
                return with_header(&format!("👤 **Member #{id}**"), &scalar_fields(result));
            };
            let mut lines = vec![member_line(&member)];
            let activities = activities_in(result, "activities")
                .or_else(|| member.extra.get("activities").and_then(parse_activities));
            if let Some(acts) = activities.filter(|a| !a.is_empty()) {
                lines.push(String::new());
                lines.push("**Recent activity**".to_string());
                lines.extend(acts.iter().take(MAX_LIST_ITEMS).map(activity_line));
            }
            with_header("👤 **Member**", &lines)
        }
        Command::Rank { new_rank, .. } | Command::SetRank { new_rank, .. } => {
            format!(
                "✅ {}",
                message_or(result, &format!("Rank changed to **{new_rank}**."))
            )
        }
        Command::Add {
            discord_username, ..
        } => format!(
            "✅ {}",
            message_or(result, &format!("Added **{discord_username}**."))
        ),
        Command::Remove { id } => format!(
            "✅ {}",
            message_or(result, &format!("Member #{id} marked inactive."))
        ),
        Command::Ranks => {
            let names: Vec<String> = result
                .get("ranks")
                .and_then(Value::as_array)
                .map(|ranks| ranks.iter().filter_map(rank_name).collect())
                .unwrap_or_default();
            let lines: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, n)| format!("{}. {n}", i + 1))
                .collect();
            with_header("🎖️ **Ranks**", &lines)
        }
        Command::Log { activity_type, .. } => format!(
            "📝 {}",
            message_or(result, &format!("{activity_type} logged."))
        ),
        Command::Activities { member_id, .. } => {
            let acts = activities_in(result, "activities").unwrap_or_default();
            if acts.is_empty() {
                return format!("📋 No activities recorded for member #{member_id}.");
            }
            let lines: Vec<String> = acts.iter().take(MAX_LIST_ITEMS).map(activity_line).collect();
            with_header(&format!("📋 **Activities for #{member_id}**"), &lines)
        }
    }
}

/// Render a failed envelope. The message is always shown.
pub fn render_failure(result: &ApiResult) -> String {
    let icon = match result.error_kind() {
        Some(ErrorKind::RateLimit) => "⏳",
        Some(ErrorKind::ConnectionError) => "🔌",
        Some(ErrorKind::PermissionDenied) => "🚫",
        Some(ErrorKind::MemberNotFound) => "🔍",
        Some(ErrorKind::Usage) => "ℹ️",
        _ => "❌",
    };
    format!("{icon} {}", result.display_message())
}

/// Truncate to `max` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn message_or(result: &ApiResult, fallback: &str) -> String {
    result
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn with_header(header: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return header.to_string();
    }
    format!("{header}\n{}", lines.join("\n"))
}

fn render_members(header: &str, members: &[Member], result: &ApiResult) -> String {
    if members.is_empty() {
        return format!("{header}\nNo members found.");
    }
    let mut lines: Vec<String> = members
        .iter()
        .take(MAX_LIST_ITEMS)
        .map(member_line)
        .collect();

    let total = result
        .get("total")
        .or_else(|| result.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(members.len() as u64);
    if total as usize > MAX_LIST_ITEMS.min(members.len()) {
        lines.push(format!(
            "_…showing {} of {total}_",
            MAX_LIST_ITEMS.min(members.len())
        ));
    }
    with_header(header, &lines)
}

fn member_line(m: &Member) -> String {
    let rank = if m.current_rank.is_empty() {
        "Unranked"
    } else {
        &m.current_rank
    };
    let mut line = format!("`#{}` **{}** · {rank}", m.id, m.display_name());
    if let (Some(_), Some(rbx)) = (&m.discord_username, &m.roblox_username) {
        line.push_str(&format!(" (Roblox: {rbx})"));
    }
    line
}

fn activity_line(a: &Activity) -> String {
    let date = a.activity_date.as_deref().unwrap_or("undated");
    match a.description.as_deref().filter(|d| !d.is_empty()) {
        Some(d) => format!("• {date} · **{}** · {d}", a.activity_type),
        None => format!("• {date} · **{}**", a.activity_type),
    }
}

fn members_in(result: &ApiResult, key: &str) -> Vec<Member> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value::<Member>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn activities_in(result: &ApiResult, key: &str) -> Option<Vec<Activity>> {
    result.get(key).and_then(parse_activities)
}

fn parse_activities(v: &Value) -> Option<Vec<Activity>> {
    let items = v.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|a| serde_json::from_value::<Activity>(a.clone()).ok())
            .collect(),
    )
}

fn rank_name(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn scalar_fields(result: &ApiResult) -> Vec<String> {
    result
        .extra
        .iter()
        .filter_map(|(k, v)| {
            let shown = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(format!("• {k}: {shown}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::types::ActivityType, domain::MemberId};
    use serde_json::json;

    fn ok(body: Value) -> ApiResult {
        ApiResult::from_body(body).unwrap()
    }

    #[test]
    fn failures_always_show_message() {
        let r = ApiResult::failure(ErrorKind::PermissionDenied, "You cannot change your own rank.");
        assert_eq!(
            render(&Command::Ranks, &r),
            "🚫 You cannot change your own rank."
        );

        let r = ok(json!({"success": false, "error": "invalid_rank"}));
        assert_eq!(render_failure(&r), "❌ Request failed (invalid_rank)");
    }

    #[test]
    fn renders_member_lists() {
        let r = ok(json!({
            "success": true,
            "members": [
                {"id": 1, "current_rank": "Marshal", "discord_username": "ana", "roblox_username": "ana_rbx"},
                {"id": 2, "current_rank": "Novice", "roblox_username": "bo"},
                {"id": "3", "current_rank": null, "discord_username": "cy"}
            ]
        }));
        let out = render(&Command::Members { search: None }, &r);
        assert!(out.starts_with("👥 **Members**"));
        assert!(out.contains("`#1` **ana** · Marshal (Roblox: ana_rbx)"));
        assert!(out.contains("`#2` **bo** · Novice"));
        assert!(out.contains("`#3` **cy** · Unranked"));
    }

    #[test]
    fn renders_empty_search() {
        let r = ok(json!({"success": true, "matches": []}));
        let cmd = Command::Search {
            name: "ghost".to_string(),
            field: Default::default(),
        };
        assert_eq!(render(&cmd, &r), "🔍 No members found matching **ghost**.");
    }

    #[test]
    fn renders_activities_and_ranks() {
        let r = ok(json!({
            "success": true,
            "activities": [
                {"activity_type": "Raid", "activity_date": "2024-05-01", "description": "north gate"},
                {"activity_type": "Patrol"}
            ]
        }));
        let out = render(
            &Command::Activities {
                member_id: MemberId(3),
                limit: 20,
            },
            &r,
        );
        assert!(out.contains("• 2024-05-01 · **Raid** · north gate"));
        assert!(out.contains("• undated · **Patrol**"));

        let r = ok(json!({"success": true, "ranks": [{"name": "Aspirant"}, "Novice"]}));
        assert_eq!(
            render(&Command::Ranks, &r),
            "🎖️ **Ranks**\n1. Aspirant\n2. Novice"
        );
    }

    #[test]
    fn mutation_success_prefers_remote_message() {
        let cmd = Command::Log {
            member_id: MemberId(3),
            activity_type: ActivityType::Tryout,
            date: None,
            description: None,
        };
        assert_eq!(render(&cmd, &ok(json!({"success": true}))), "📝 Tryout logged.");
        assert_eq!(
            render(&cmd, &ok(json!({"success": true, "message": "Activity #9 saved"}))),
            "📝 Activity #9 saved"
        );
    }

    #[test]
    fn truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("ããããã", 4), "ã...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
