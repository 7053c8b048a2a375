//! Connectivity monitor
//!
//! Holds the current ONLINE/OFFLINE state and fans transition events out to
//! subscribers. The host reports transitions through [`ConnectivityMonitor::set_status`];
//! nothing here polls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// One reported connectivity event
///
/// `previous == current` when the host repeats a state; subscribers must
/// tolerate that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityChange {
    pub previous: Connectivity,
    pub current: Connectivity,
}

impl ConnectivityChange {
    /// OFFLINE -> ONLINE
    pub fn is_reconnect(&self) -> bool {
        self.previous == Connectivity::Offline && self.current == Connectivity::Online
    }

    /// ONLINE -> OFFLINE
    pub fn is_disconnect(&self) -> bool {
        self.previous == Connectivity::Online && self.current == Connectivity::Offline
    }
}

struct Inner {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityChange>,
}

/// Cloneable handle to the shared connectivity state
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &self.status())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// `initial` is the host's state at construction time
    pub fn new(initial: Connectivity) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(initial.is_online()),
                events,
            }),
        }
    }

    pub fn status(&self) -> Connectivity {
        Connectivity::from_online(self.inner.online.load(Ordering::Acquire))
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Record a host connectivity event and notify subscribers
    pub fn set_status(&self, status: Connectivity) -> ConnectivityChange {
        let was_online = self.inner.online.swap(status.is_online(), Ordering::AcqRel);
        let change = ConnectivityChange {
            previous: Connectivity::from_online(was_online),
            current: status,
        };

        if change.previous != change.current {
            tracing::info!("Connectivity changed: {} -> {}", change.previous, change.current);
        } else {
            tracing::debug!("Connectivity still {}", change.current);
        }

        // No subscribers is fine
        let _ = self.inner.events.send(change);
        change
    }

    /// Network-available signal
    pub fn notify_online(&self) -> ConnectivityChange {
        self.set_status(Connectivity::Online)
    }

    /// Network-unavailable signal
    pub fn notify_offline(&self) -> ConnectivityChange {
        self.set_status(Connectivity::Offline)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityChange> {
        self.inner.events.subscribe()
    }
}
