//! Queue inspection and editing commands

use super::{load_config, open_queue};
use anyhow::{bail, Context, Result};
use pacer_common::EXIT_SUCCESS;
use pacer_sync::{ActionKind, PendingAction, SyncConfig};
use serde_json::Value;
use uuid::Uuid;

/// Build the action for `kind` from command-line arguments
pub fn build_action(
    kind: ActionKind,
    data: Option<String>,
    team: Option<i64>,
    user: Option<i64>,
) -> Result<PendingAction> {
    let payload = data
        .map(|raw| serde_json::from_str::<Value>(&raw).context("--data is not valid JSON"))
        .transpose()?;

    let require_team = || team.with_context(|| format!("{} requires --team", kind));
    let require_user = || user.with_context(|| format!("{} requires --user", kind));
    let require_data = || {
        payload
            .clone()
            .with_context(|| format!("{} requires --data", kind))
    };

    let action = match kind {
        ActionKind::SaveProgress => PendingAction::SaveProgress(require_data()?),
        ActionKind::SaveSession => PendingAction::SaveSession(require_data()?),
        ActionKind::CreateTeamChallenge => PendingAction::CreateTeamChallenge {
            team_id: require_team()?,
            challenge: require_data()?,
        },
        ActionKind::JoinTeam => PendingAction::JoinTeam {
            team_id: require_team()?,
            user_id: require_user()?,
        },
        ActionKind::LeaveTeam => PendingAction::LeaveTeam {
            team_id: require_team()?,
            user_id: require_user()?,
        },
    };
    Ok(action)
}

pub async fn cmd_enqueue(
    kind: ActionKind,
    data: Option<String>,
    team: Option<i64>,
    user: Option<i64>,
) -> Result<i32> {
    let action = build_action(kind, data, team, user)?;
    let config = SyncConfig::from(&load_config()?);
    let queue = open_queue(&config);

    let entry = queue.enqueue(action).context("Failed to queue action")?;
    eprintln!("✓ Queued {} ({} pending)", entry.kind(), queue.len());
    println!("{}", entry.id);
    Ok(EXIT_SUCCESS)
}

pub async fn cmd_list(json: bool) -> Result<i32> {
    let config = SyncConfig::from(&load_config()?);
    let actions = open_queue(&config)
        .try_list()
        .context("Failed to read pending actions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(EXIT_SUCCESS);
    }

    if actions.is_empty() {
        eprintln!("No pending actions");
        return Ok(EXIT_SUCCESS);
    }

    eprintln!("{} pending actions:", actions.len());
    for action in &actions {
        let line = format!(
            "{}  {:<22} {}",
            action.id,
            action.kind().as_str(),
            action.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        match &action.error {
            Some(error) => println!("{}  last error: {}", line, error),
            None => println!("{}", line),
        }
    }
    Ok(EXIT_SUCCESS)
}

pub async fn cmd_clear() -> Result<i32> {
    let config = SyncConfig::from(&load_config()?);
    let queue = open_queue(&config);

    let count = queue.len();
    queue.clear().context("Failed to clear queue")?;
    eprintln!("✓ Cleared {} pending actions", count);
    Ok(EXIT_SUCCESS)
}

pub async fn cmd_drop(id: &str) -> Result<i32> {
    let id = Uuid::parse_str(id.trim()).with_context(|| format!("Invalid action id '{}'", id))?;
    let config = SyncConfig::from(&load_config()?);

    match open_queue(&config).remove(id)? {
        Some(removed) => {
            eprintln!("✓ Dropped {} ({})", removed.kind(), removed.id);
            Ok(EXIT_SUCCESS)
        }
        None => bail!("No pending action with id {}", id),
    }
}
