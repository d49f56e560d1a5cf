//! Synchronous fan-out of change events.
//!
//! Listeners run in registration order on the emitting thread. There is no
//! queue and no replay: a listener registered after an emission never sees it.

use serde::Serialize;

use crate::error::ErrorCode;
use crate::model::artifact::{ArtifactKey, Category};

/// What part of the tree changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum TreeChange {
    /// Whole tree replaced; redraw from the root.
    Root,
    /// One category header and its children.
    Header { category: Category },
    /// One item.
    Node { key: ArtifactKey },
}

/// User-facing error raised on a confirmed total fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl FailureNotice {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            hint: code.hint(),
        }
    }
}

/// Handle returned by [`ChangeChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn FnMut(&E) + Send>;

pub struct ChangeChannel<E> {
    listeners: Vec<(ListenerId, Listener<E>)>,
    next_id: u64,
}

impl<E> Default for ChangeChannel<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E> std::fmt::Debug for ChangeChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeChannel")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E> ChangeChannel<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut channel = ChangeChannel::new();
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            channel.subscribe(move |change: &TreeChange| {
                seen.lock().expect("lock").push((tag, *change));
            });
        }

        channel.emit(&TreeChange::Root);
        let seen = seen.lock().expect("lock");
        assert_eq!(
            *seen,
            vec![("a", TreeChange::Root), ("b", TreeChange::Root), ("c", TreeChange::Root)]
        );
    }

    #[test]
    fn unsubscribed_listener_misses_events() {
        let hits = Arc::new(Mutex::new(0_u32));
        let mut channel = ChangeChannel::new();
        let counter = Arc::clone(&hits);
        let id = channel.subscribe(move |_: &TreeChange| *counter.lock().expect("lock") += 1);

        channel.emit(&TreeChange::Root);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.emit(&TreeChange::Root);

        assert_eq!(*hits.lock().expect("lock"), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn emitting_without_listeners_is_fine() {
        let mut channel: ChangeChannel<TreeChange> = ChangeChannel::new();
        channel.emit(&TreeChange::Header {
            category: Category::Task,
        });
    }

    #[test]
    fn failure_notice_carries_code_and_hint() {
        let notice = FailureNotice::new(ErrorCode::TotalFetchFailure, "all three fetches failed");
        assert_eq!(notice.code, "E3002");
        assert!(notice.hint.is_some());
    }
}
