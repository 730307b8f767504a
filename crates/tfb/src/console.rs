//! Line-oriented stand-in for a chat platform.
//!
//! Each stdin line is one command, issued as the identity configured through
//! `TF_ACTOR_ID` / `TF_ACTOR_RANK`; the rendered reply goes to stdout.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tfb_core::{api::MembershipClient, commands, config::Config, domain::Actor};

pub async fn run(cfg: Arc<Config>, client: Arc<MembershipClient>) -> anyhow::Result<()> {
    let actor = Actor::new(cfg.actor_id.clone(), cfg.actor_rank.clone());

    println!("tfb started: {}", client.base_url());
    println!(
        "Acting as: {} ({})",
        actor.user_id.as_str(),
        actor.rank.as_deref().unwrap_or("no rank, permission checks skipped")
    );

    // Startup credential check is informational only.
    let auth = client.verify_auth().await;
    if auth.success {
        info!("TF System credentials verified");
    } else {
        warn!(message = %auth.display_message(), "TF System credential check failed");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_quit(line) {
            break;
        }

        let reply = commands::handle_line(&client, &actor, line, cfg.message_limit).await;
        println!("{reply}\n");
    }

    info!("stdin closed, shutting down");
    Ok(())
}

fn is_quit(line: &str) -> bool {
    matches!(
        line.trim_start_matches(['!', '/']).to_lowercase().as_str(),
        "quit" | "exit"
    )
}
