//! The object collaborators talk to.
//!
//! `SpiraProvider` owns every piece of mutable state and is driven from one
//! thread: [`SpiraProvider::refresh`] starts a cycle, [`SpiraProvider::tick`]
//! runs the timer and applies arrived completions, and listeners hear about
//! changes synchronously from inside those calls.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::client::SpiraClient;
use crate::config::SpiraConfig;
use crate::error::KeyParseError;
use crate::model::artifact::{Artifact, ArtifactKey, Category};
use crate::model::detail::ArtifactDetail;
use crate::notify::{ChangeChannel, FailureNotice, ListenerId, TreeChange};
use crate::schedule::{RefreshScheduler, SchedulerState};
use crate::sync::coordinator::{CycleOutcome, FetchCoordinator};
use crate::sync::cycle::CycleId;
use crate::sync::dispatch::{Completion, Dispatch, ThreadDispatcher};
use crate::tree::TreeSnapshot;

pub struct SpiraProvider {
    config: SpiraConfig,
    coordinator: FetchCoordinator,
    scheduler: RefreshScheduler,
    changes: ChangeChannel<TreeChange>,
    failures: ChangeChannel<FailureNotice>,
    dispatcher: Box<dyn Dispatch>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    last_published: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SpiraProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiraProvider")
            .field("generation", &self.coordinator.snapshot().generation())
            .field("scheduler", &self.scheduler)
            .field("last_published", &self.last_published)
            .finish_non_exhaustive()
    }
}

impl SpiraProvider {
    /// A provider that fetches from the configured Spira server on worker
    /// threads.
    #[must_use]
    pub fn connect(config: SpiraConfig) -> Self {
        let client = SpiraClient::new(config.credentials.clone());
        Self::new(config, ThreadDispatcher::new(client), Instant::now())
    }

    /// No cycle is started; call [`SpiraProvider::refresh`] for the first
    /// population.
    pub fn new(config: SpiraConfig, dispatcher: impl Dispatch + 'static, now: Instant) -> Self {
        let (tx, rx) = mpsc::channel();
        let scheduler = RefreshScheduler::new(config.refresh_interval(), now);
        Self {
            config,
            coordinator: FetchCoordinator::new(),
            scheduler,
            changes: ChangeChannel::new(),
            failures: ChangeChannel::new(),
            dispatcher: Box::new(dispatcher),
            tx,
            rx,
            last_published: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SpiraConfig {
        &self.config
    }

    /// Replace the configuration. Visibility changes apply from the next
    /// cycle, the interval from the next reschedule.
    pub fn set_config(&mut self, config: SpiraConfig, now: Instant) {
        self.scheduler.set_interval(config.refresh_interval(), now);
        self.config = config;
    }

    pub fn refresh(&mut self, explicit: bool) -> CycleId {
        self.refresh_at(explicit, Instant::now())
    }

    /// Start a cycle. An explicit refresh also resumes a halted timer.
    pub fn refresh_at(&mut self, explicit: bool, now: Instant) -> CycleId {
        if explicit {
            self.scheduler.explicit_refresh(now);
        }
        let plan = self
            .coordinator
            .begin_cycle(explicit, self.config.view.visibility());
        for request in plan.requests {
            self.dispatcher.dispatch(request, &self.tx);
        }
        if let Some(outcome) = plan.settled {
            self.handle(&outcome);
        }
        plan.cycle
    }

    /// One cooperative step: start a timer refresh if due, then apply every
    /// completion that has arrived. Returns the number applied.
    pub fn tick(&mut self, now: Instant) -> usize {
        if self.scheduler.poll(now) {
            self.refresh_at(false, now);
        }
        self.pump()
    }

    /// Apply arrived completions without blocking.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block until the in-flight cycle settles. Returns `false` on timeout.
    pub fn wait_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        while !self.is_settled() {
            let remaining =
                deadline.map_or(timeout, |deadline| deadline.saturating_duration_since(Instant::now()));
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => self.apply(completion),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return self.is_settled();
                }
            }
        }
        true
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.coordinator.in_flight().is_none()
    }

    fn apply(&mut self, completion: Completion) {
        let outcome = self.coordinator.complete(completion);
        self.handle(&outcome);
    }

    fn handle(&mut self, outcome: &CycleOutcome) {
        if let CycleOutcome::Published { .. } = outcome {
            self.last_published = Some(Utc::now());
        }
        if outcome.tree_changed() {
            self.changes.emit(&TreeChange::Root);
        }
        if let Some(notice) = outcome.notice() {
            self.scheduler.halt();
            self.failures.emit(notice);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        self.coordinator.snapshot()
    }

    #[must_use]
    pub fn children(&self, node: Option<&Artifact>) -> Vec<Artifact> {
        self.coordinator.store().current().children(node)
    }

    #[must_use]
    pub fn lookup(&self, token: &str, item_id: i64) -> Option<Artifact> {
        self.coordinator.store().current().lookup(token, item_id).cloned()
    }

    /// Look up by composite key, e.g. `TK:7`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyParseError`] when `key` is not `TOKEN:ID`.
    pub fn lookup_key(&self, key: &str) -> Result<Option<Artifact>, KeyParseError> {
        let key: ArtifactKey = key.parse()?;
        Ok(self.coordinator.store().current().find(key).cloned())
    }

    /// Detail view for `key`, or the placeholder when it is not in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`KeyParseError`] when `key` is not `TOKEN:ID`.
    pub fn detail(&self, key: &str) -> Result<ArtifactDetail, KeyParseError> {
        Ok(self.lookup_key(key)?.map_or_else(ArtifactDetail::not_found, |artifact| {
            ArtifactDetail::for_artifact(&artifact, &self.config.credentials.url)
        }))
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TreeChange) + Send + 'static) -> ListenerId {
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.changes.unsubscribe(id)
    }

    pub fn subscribe_failures(
        &mut self,
        listener: impl FnMut(&FailureNotice) + Send + 'static,
    ) -> ListenerId {
        self.failures.subscribe(listener)
    }

    #[must_use]
    pub const fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    #[must_use]
    pub const fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Categories that failed in the last settled cycle, including the
    /// cycle that confirmed a total failure.
    #[must_use]
    pub fn failed_categories(&self) -> Vec<Category> {
        self.coordinator.last_settled_failed().to_vec()
    }

    /// Wall-clock time of the last successful publication.
    #[must_use]
    pub const fn last_published(&self) -> Option<DateTime<Utc>> {
        self.last_published
    }
}
