//! User-facing offline notice
//!
//! The banner text is a pure function of three facts: whether we are online,
//! whether we just came back from offline, and how many actions are queued.

use crate::connectivity::ConnectivityChange;
use pacer_common::Severity;
use serde::Serialize;
use std::time::Duration;

/// How long non-offline notices stay up
pub const AUTO_HIDE_AFTER: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoticeState {
    pub online: bool,
    pub was_offline: bool,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    /// Show a "sync now" affordance
    pub offer_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// `None` keeps the notice up until dismissed
    #[serde(skip)]
    pub auto_hide: Option<Duration>,
}

/// Notice for `state`, or `None` when there is nothing to say
pub fn notice_for(state: NoticeState) -> Option<Notice> {
    let NoticeState {
        online,
        was_offline,
        pending,
    } = state;

    let message = if !online {
        "You're currently offline. Your changes will be saved locally and synced when you reconnect."
            .to_string()
    } else if was_offline && pending > 0 {
        format!("You're back online! You have {} pending changes to sync.", pending)
    } else if was_offline {
        "You're back online!".to_string()
    } else if pending > 0 {
        format!("You have {} pending changes to sync.", pending)
    } else {
        return None;
    };

    let severity = if !online {
        Severity::Warning
    } else if pending > 0 {
        Severity::Info
    } else {
        Severity::Success
    };

    let detail = (online && pending > 0)
        .then(|| "These will be automatically synced in the background.".to_string());

    Some(Notice {
        severity,
        message,
        offer_sync: online && (was_offline || pending > 0),
        detail,
        auto_hide: online.then_some(AUTO_HIDE_AFTER),
    })
}

/// Tracks the "just came back online" flag across connectivity events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoticeTracker {
    state: NoticeState,
}

impl NoticeTracker {
    pub fn new(online: bool, pending: usize) -> Self {
        Self {
            state: NoticeState {
                online,
                was_offline: false,
                pending,
            },
        }
    }

    pub fn state(&self) -> NoticeState {
        self.state
    }

    /// Fold one connectivity event in; returns the notice to show, if any
    pub fn observe(&mut self, change: ConnectivityChange, pending: usize) -> Option<Notice> {
        self.state.pending = pending;
        if change.is_reconnect() {
            self.state.was_offline = true;
        }
        self.state.online = change.current.is_online();
        notice_for(self.state)
    }

    pub fn set_pending(&mut self, pending: usize) {
        self.state.pending = pending;
    }

    /// The user synced or dismissed the "back online" notice
    pub fn acknowledge(&mut self) {
        self.state.was_offline = false;
    }

    pub fn current(&self) -> Option<Notice> {
        notice_for(self.state)
    }
}
