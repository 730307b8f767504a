//! Chat-command entry point.
//!
//! A chat adapter hands over the raw command text and the acting identity;
//! this module parses it, calls the matching client operation and renders the
//! envelope. Parse failures never reach the network.

use chrono::NaiveDate;

use crate::{
    api::{
        types::{
            ActivityType, MemberQuery, NewActivity, NewMember, SearchField,
            DEFAULT_ACTIVITY_LIMIT,
        },
        ApiResult, ErrorKind, MembershipClient,
    },
    domain::{Actor, MemberId},
    formatting,
    rank::Rank,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Status,
    Verify,
    Members {
        search: Option<String>,
    },
    Member {
        id: MemberId,
    },
    Search {
        name: String,
        field: SearchField,
    },
    /// Permission-checked rank change by name.
    Rank {
        name: String,
        new_rank: String,
        reason: Option<String>,
    },
    /// Raw rank change by id (no local permission check).
    SetRank {
        id: MemberId,
        new_rank: String,
        reason: Option<String>,
    },
    Add {
        discord_username: String,
        roblox_username: Option<String>,
        rank: Option<String>,
    },
    Remove {
        id: MemberId,
    },
    Ranks,
    Log {
        member_id: MemberId,
        activity_type: ActivityType,
        date: Option<NaiveDate>,
        description: Option<String>,
    },
    Activities {
        member_id: MemberId,
        limit: u32,
    },
    Help,
}

pub const HELP_TEXT: &str = "\
**TF System commands**
`!status` · system status
`!verify` · check API credentials
`!members [search]` · list active members
`!member <id>` · member details
`!search <name> [discord_username|roblox_username|both]`
`!rank <name> <new rank> [reason]` · change rank (must outrank the member)
`!setrank <id> <new rank> [reason]`
`!add <discord name> [roblox name] [rank]`
`!remove <id>`
`!ranks` · list ranks
`!log <member id> <Raid|Patrol|Training|Mission|Tryout> [YYYY-MM-DD] [description]`
`!activities <member id> [limit]`

Quote names with spaces, e.g. `!rank joao \"Chief General\"`.";

/// Parse a command line (`!verb args` or `/verb args`).
///
/// The error is a user-facing usage message.
pub fn parse_command(text: &str) -> Result<Command, String> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix('!')
        .or_else(|| trimmed.strip_prefix('/'))
        .unwrap_or(trimmed);

    let words = split_args(body);
    let Some((verb, args)) = words.split_first() else {
        return Err("Empty command. Try `!help`.".to_string());
    };

    // Chat platforms may send `/cmd@botname`.
    let verb = verb.split('@').next().unwrap_or("").to_lowercase();

    match verb.as_str() {
        "status" => Ok(Command::Status),
        "verify" => Ok(Command::Verify),
        "help" => Ok(Command::Help),
        "ranks" => Ok(Command::Ranks),
        "members" => Ok(Command::Members {
            search: join_rest(args),
        }),
        "member" => Ok(Command::Member {
            id: member_id_arg(args.first(), "!member <id>")?,
        }),
        "search" => {
            let name = required(args.first(), "!search <name> [field]")?;
            let field = match args.get(1) {
                Some(f) => f.parse::<SearchField>()?,
                None => SearchField::Both,
            };
            Ok(Command::Search { name, field })
        }
        "rank" => {
            let usage = "!rank <name> <new rank> [reason]";
            Ok(Command::Rank {
                name: required(args.first(), usage)?,
                new_rank: required(args.get(1), usage)?,
                reason: join_rest(args.get(2..).unwrap_or_default()),
            })
        }
        "setrank" => {
            let usage = "!setrank <id> <new rank> [reason]";
            Ok(Command::SetRank {
                id: member_id_arg(args.first(), usage)?,
                new_rank: required(args.get(1), usage)?,
                reason: join_rest(args.get(2..).unwrap_or_default()),
            })
        }
        "add" => parse_add(args),
        "remove" => Ok(Command::Remove {
            id: member_id_arg(args.first(), "!remove <id>")?,
        }),
        "log" => parse_log(args),
        "activities" => {
            let usage = "!activities <member id> [limit]";
            let member_id = member_id_arg(args.first(), usage)?;
            let limit = match args.get(1) {
                Some(l) => l
                    .parse::<u32>()
                    .ok()
                    .filter(|l| *l > 0)
                    .ok_or_else(|| format!("Invalid limit '{l}'. Usage: `{usage}`"))?,
                None => DEFAULT_ACTIVITY_LIMIT,
            };
            Ok(Command::Activities { member_id, limit })
        }
        other => Err(format!("Unknown command `{other}`. Try `!help`.")),
    }
}

fn parse_add(args: &[String]) -> Result<Command, String> {
    let usage = "!add <discord name> [roblox name] [rank]";
    let discord_username = required(args.first(), usage)?;

    // A lone second argument that names a rank is the rank, not a username.
    let (roblox_username, rank) = match (args.get(1), args.get(2)) {
        (Some(second), None) if Rank::from_name(second).is_some() => (None, Some(second.clone())),
        (second, third) => (second.cloned(), third.cloned()),
    };

    Ok(Command::Add {
        discord_username,
        roblox_username,
        rank,
    })
}

fn parse_log(args: &[String]) -> Result<Command, String> {
    let usage = "!log <member id> <type> [YYYY-MM-DD] [description]";
    let member_id = member_id_arg(args.first(), usage)?;
    let activity_type = required(args.get(1), usage)?.parse::<ActivityType>()?;

    let mut rest = args.get(2..).unwrap_or_default();
    let mut date = None;
    if let Some(first) = rest.first() {
        if let Ok(d) = NaiveDate::parse_from_str(first, "%Y-%m-%d") {
            date = Some(d);
            rest = &rest[1..];
        }
    }

    Ok(Command::Log {
        member_id,
        activity_type,
        date,
        description: join_rest(rest),
    })
}

fn required(arg: Option<&String>, usage: &str) -> Result<String, String> {
    arg.filter(|a| !a.trim().is_empty())
        .cloned()
        .ok_or_else(|| format!("Missing argument. Usage: `{usage}`"))
}

fn member_id_arg(arg: Option<&String>, usage: &str) -> Result<MemberId, String> {
    let raw = required(arg, usage)?;
    raw.trim_start_matches('#')
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(MemberId)
        .ok_or_else(|| format!("Invalid member id '{raw}'. Usage: `{usage}`"))
}

fn join_rest(args: &[String]) -> Option<String> {
    let s = args.join(" ");
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Split on whitespace, honoring single/double quotes and backslash escapes.
fn split_args(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars();

    let mut in_single = false;
    let mut in_double = false;
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        match ch {
            // Apostrophes inside a word ("didn't") stay literal.
            '\'' if !in_double && (in_single || cur.is_empty()) => {
                in_single = !in_single;
                quoted = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                quoted = true;
            }
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !cur.is_empty() || quoted {
                    out.push(std::mem::take(&mut cur));
                    quoted = false;
                }
            }
            other => cur.push(other),
        }
    }

    if !cur.is_empty() || quoted {
        out.push(cur);
    }

    out
}

// ============== Dispatch ==============

/// Run a parsed command against the API on behalf of `actor`.
pub async fn dispatch(client: &MembershipClient, actor: &Actor, cmd: &Command) -> ApiResult {
    let actor_id = Some(actor.user_id.as_str()).filter(|id| !id.is_empty());

    match cmd {
        Command::Help => ApiResult {
            success: true,
            message: Some(HELP_TEXT.to_string()),
            ..Default::default()
        },
        Command::Status => client.get_status().await,
        Command::Verify => client.verify_auth().await,
        Command::Members { search } => {
            let query = MemberQuery {
                search: search.clone(),
                ..Default::default()
            };
            client.get_members(&query).await
        }
        Command::Member { id } => client.get_member(*id).await,
        Command::Search { name, field } => client.search_member(name, *field).await,
        Command::Rank {
            name,
            new_rank,
            reason,
        } => {
            client
                .change_rank_by_name(
                    name,
                    new_rank,
                    reason.as_deref(),
                    actor_id,
                    actor.rank.as_deref(),
                )
                .await
        }
        Command::SetRank {
            id,
            new_rank,
            reason,
        } => {
            client
                .change_member_rank(*id, new_rank, reason.as_deref(), actor_id)
                .await
        }
        Command::Add {
            discord_username,
            roblox_username,
            rank,
        } => {
            let mut member = NewMember::new(discord_username.clone());
            member.roblox_username = roblox_username.clone();
            if let Some(r) = rank {
                member.current_rank = r.clone();
            }
            member.discord_user_id = actor_id.map(str::to_string);
            client.add_member(&member).await
        }
        Command::Remove { id } => client.remove_member(*id, actor_id).await,
        Command::Ranks => client.get_ranks().await,
        Command::Log {
            member_id,
            activity_type,
            date,
            description,
        } => {
            let mut activity = NewActivity::new(*member_id, *activity_type);
            activity.activity_date = *date;
            activity.description = description.clone();
            if let Some(id) = actor_id {
                activity.logged_by = id.to_string();
            }
            client.log_activity(&activity).await
        }
        Command::Activities { member_id, limit } => {
            client.get_member_activities(*member_id, *limit).await
        }
    }
}

/// Parse, dispatch and render one command line into chat markdown.
///
/// Output is truncated to `max_len` characters.
pub async fn handle_line(
    client: &MembershipClient,
    actor: &Actor,
    text: &str,
    max_len: usize,
) -> String {
    let rendered = match parse_command(text) {
        Ok(cmd) => {
            let result = dispatch(client, actor, &cmd).await;
            formatting::render(&cmd, &result)
        }
        Err(usage) => formatting::render_failure(&ApiResult::failure(ErrorKind::Usage, usage)),
    };
    formatting::truncate_chars(&rendered, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::transport::{HttpRequest, HttpResponse, Transport, TransportError},
        config::ApiConfig,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn execute(
            &self,
            req: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(req);
            Ok(HttpResponse {
                status: 200,
                body: r#"{"success": true, "message": "Activity logged"}"#.to_string(),
            })
        }
    }

    fn client(t: &Arc<RecordingTransport>) -> MembershipClient {
        let cfg = ApiConfig {
            api_url: "http://tf.test/api/v1".to_string(),
            api_key: "k".to_string(),
            request_timeout: None,
        };
        MembershipClient::with_transport(&cfg, t.clone())
    }

    #[tokio::test]
    async fn usage_errors_and_help_stay_local() {
        let t = Arc::new(RecordingTransport::default());
        let c = client(&t);
        let actor = Actor::new("42", Some("Marshal".to_string()));

        let out = handle_line(&c, &actor, "!rank joao", 2000).await;
        assert!(out.starts_with("ℹ️ Missing argument"));

        let out = handle_line(&c, &actor, "!help", 2000).await;
        assert!(out.starts_with("**TF System commands**"));

        assert!(t.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_attributes_activity_to_actor() {
        let t = Arc::new(RecordingTransport::default());
        let c = client(&t);
        let actor = Actor::new("42", None);

        let out = handle_line(&c, &actor, "!log 7 training drills", 2000).await;
        assert_eq!(out, "📝 Activity logged");

        let reqs = t.requests.lock().unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].url, "http://tf.test/api/v1/activity");
        assert_eq!(
            reqs[0].body,
            Some(serde_json::json!({
                "member_id": 7,
                "activity_type": "Training",
                "description": "drills",
                "discord_user_id": "42"
            }))
        );
    }

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(
            split_args(r#"rank "João Silva" 'Chief General' for \"great\" work"#),
            vec!["rank", "João Silva", "Chief General", "for", "\"great\"", "work"]
        );
        assert_eq!(split_args(r#"search """#), vec!["search", ""]);
        assert!(split_args("   ").is_empty());
        assert_eq!(split_args("he didn't show"), vec!["he", "didn't", "show"]);
    }

    #[test]
    fn parses_rank_with_reason() {
        let cmd = parse_command(r#"!rank joao "Chief General" outstanding raid lead"#).unwrap();
        assert_eq!(
            cmd,
            Command::Rank {
                name: "joao".to_string(),
                new_rank: "Chief General".to_string(),
                reason: Some("outstanding raid lead".to_string()),
            }
        );

        let cmd = parse_command("/rank@tfbot joao Adept").unwrap();
        assert!(matches!(cmd, Command::Rank { reason: None, .. }));
    }

    #[test]
    fn rejects_missing_and_invalid_arguments() {
        assert!(parse_command("!rank joao").unwrap_err().contains("Usage"));
        assert!(parse_command("!member abc").unwrap_err().contains("Invalid member id"));
        assert!(parse_command("!member 0").is_err());
        assert!(parse_command("!activities 3 many").is_err());
        assert!(parse_command("!log 3 Party").unwrap_err().contains("Raid"));
        assert!(parse_command("!search joao everywhere").is_err());
        assert!(parse_command("!frobnicate").unwrap_err().contains("Unknown command"));
        assert!(parse_command("").is_err());
    }

    #[test]
    fn parses_add_rank_or_secondary_name() {
        assert_eq!(
            parse_command("!add joao Novice").unwrap(),
            Command::Add {
                discord_username: "joao".to_string(),
                roblox_username: None,
                rank: Some("Novice".to_string()),
            }
        );
        assert_eq!(
            parse_command("!add joao joao_rbx").unwrap(),
            Command::Add {
                discord_username: "joao".to_string(),
                roblox_username: Some("joao_rbx".to_string()),
                rank: None,
            }
        );
    }

    #[test]
    fn parses_log_with_optional_date() {
        assert_eq!(
            parse_command("!log #4 patrol 2024-05-01 north gate sweep").unwrap(),
            Command::Log {
                member_id: MemberId(4),
                activity_type: ActivityType::Patrol,
                date: NaiveDate::from_ymd_opt(2024, 5, 1),
                description: Some("north gate sweep".to_string()),
            }
        );
        assert_eq!(
            parse_command("!log 4 Raid").unwrap(),
            Command::Log {
                member_id: MemberId(4),
                activity_type: ActivityType::Raid,
                date: None,
                description: None,
            }
        );
    }

    #[test]
    fn activities_default_limit() {
        assert_eq!(
            parse_command("!activities 9").unwrap(),
            Command::Activities {
                member_id: MemberId(9),
                limit: DEFAULT_ACTIVITY_LIMIT,
            }
        );
    }
}
