//! Queued action types
//!
//! A [`PendingAction`] is one mutation of remote state recorded while the API
//! could not be reached. A queue entry is stored flat, `{"type": ..., "data":
//! ..., "timestamp": ...}` plus `id`/`error`, the shape the web client wrote,
//! so queues created by older clients still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payload-free tag of a [`PendingAction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    SaveProgress,
    SaveSession,
    CreateTeamChallenge,
    JoinTeam,
    LeaveTeam,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::SaveProgress,
        ActionKind::SaveSession,
        ActionKind::CreateTeamChallenge,
        ActionKind::JoinTeam,
        ActionKind::LeaveTeam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SaveProgress => "SAVE_PROGRESS",
            ActionKind::SaveSession => "SAVE_SESSION",
            ActionKind::CreateTeamChallenge => "CREATE_TEAM_CHALLENGE",
            ActionKind::JoinTeam => "JOIN_TEAM",
            ActionKind::LeaveTeam => "LEAVE_TEAM",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    /// Accepts `JOIN_TEAM`, `join-team`, `join_team` and the legacy web tags
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "SAVE_PROGRESS" | "SAVE_USER_PROGRESS" => Ok(ActionKind::SaveProgress),
            "SAVE_SESSION" | "SAVE_GAME_SESSION" => Ok(ActionKind::SaveSession),
            "CREATE_TEAM_CHALLENGE" => Ok(ActionKind::CreateTeamChallenge),
            "JOIN_TEAM" => Ok(ActionKind::JoinTeam),
            "LEAVE_TEAM" => Ok(ActionKind::LeaveTeam),
            _ => Err(format!(
                "unknown action type '{}' (expected one of: {})",
                s,
                ActionKind::ALL.map(|k| k.as_str()).join(", ")
            )),
        }
    }
}

/// A mutation waiting to be replayed against the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingAction {
    #[serde(alias = "SAVE_USER_PROGRESS")]
    SaveProgress(Value),

    #[serde(alias = "SAVE_GAME_SESSION")]
    SaveSession(Value),

    CreateTeamChallenge {
        #[serde(alias = "teamId")]
        team_id: i64,
        challenge: Value,
    },

    JoinTeam {
        #[serde(alias = "teamId")]
        team_id: i64,
        #[serde(alias = "userId")]
        user_id: i64,
    },

    LeaveTeam {
        #[serde(alias = "teamId")]
        team_id: i64,
        #[serde(alias = "userId")]
        user_id: i64,
    },
}

impl PendingAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PendingAction::SaveProgress(_) => ActionKind::SaveProgress,
            PendingAction::SaveSession(_) => ActionKind::SaveSession,
            PendingAction::CreateTeamChallenge { .. } => ActionKind::CreateTeamChallenge,
            PendingAction::JoinTeam { .. } => ActionKind::JoinTeam,
            PendingAction::LeaveTeam { .. } => ActionKind::LeaveTeam,
        }
    }
}

/// An entry of the action queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Assigned at enqueue; nil for entries written by older clients until
    /// the queue assigns one
    #[serde(default)]
    pub id: Uuid,

    #[serde(flatten)]
    pub action: PendingAction,

    /// Creation time, assigned at enqueue
    pub timestamp: DateTime<Utc>,

    /// Reason of the last failed replay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueuedAction {
    pub fn new(action: PendingAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Same entry annotated with a replay failure
    pub fn with_error(mut self, reason: impl Into<String>) -> Self {
        self.error = Some(reason.into());
        self
    }
}
