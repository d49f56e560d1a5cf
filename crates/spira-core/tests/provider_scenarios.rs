use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use spira_core::config::SpiraConfig;
use spira_core::error::FetchError;
use spira_core::notify::{FailureNotice, TreeChange};
use spira_core::schedule::SchedulerState;
use spira_core::sync::{CollectionFetcher, CollectionRequest, FetchResponse, InlineDispatcher};
use spira_core::{Artifact, Category, SpiraProvider};

/// Fetcher whose server can be switched off between cycles.
#[derive(Clone, Default)]
struct Switchable {
    down: Arc<AtomicBool>,
}

impl CollectionFetcher for Switchable {
    fn fetch(&self, request: &CollectionRequest) -> Result<FetchResponse, FetchError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("connection refused".into()));
        }
        let body = match request.category {
            Category::Requirement => json!([{ "RequirementId": 1, "Name": "Login" }]),
            Category::Task => json!([]),
            Category::Incident => json!([{ "IncidentId": 7, "Name": "Crash" }]),
        };
        Ok(FetchResponse::ok(body))
    }
}

struct Harness {
    provider: SpiraProvider,
    down: Arc<AtomicBool>,
    changes: Arc<Mutex<Vec<TreeChange>>>,
    notices: Arc<Mutex<Vec<FailureNotice>>>,
}

impl Harness {
    fn new(refresh_time: i64, start: Instant) -> Self {
        let fetcher = Switchable::default();
        let down = Arc::clone(&fetcher.down);
        let mut config = SpiraConfig::default();
        config.refresh.refresh_time = refresh_time;
        let mut provider = SpiraProvider::new(config, InlineDispatcher::new(fetcher), start);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        provider.subscribe(move |change| sink.lock().expect("lock").push(*change));

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        provider.subscribe_failures(move |notice| sink.lock().expect("lock").push(notice.clone()));

        Self {
            provider,
            down,
            changes,
            notices,
        }
    }

    fn explicit_cycle(&mut self, server_down: bool, now: Instant) {
        self.down.store(server_down, Ordering::SeqCst);
        self.provider.refresh_at(true, now);
        self.provider.pump();
    }

    fn notice_count(&self) -> usize {
        self.notices.lock().expect("lock").len()
    }

    fn change_count(&self) -> usize {
        self.changes.lock().expect("lock").len()
    }
}

#[test]
fn confirmed_total_failure_halts_then_explicit_success_resumes() {
    let start = Instant::now();
    let mut harness = Harness::new(60, start);

    harness.explicit_cycle(true, start);
    assert_eq!(harness.notice_count(), 0);
    assert_eq!(harness.provider.scheduler_state(), SchedulerState::Running);
    assert!(harness.provider.snapshot().is_empty());

    harness.explicit_cycle(true, start + Duration::from_secs(1));
    assert_eq!(harness.notice_count(), 1);
    assert_eq!(harness.notices.lock().expect("lock")[0].code, "E3002");
    assert_eq!(harness.provider.scheduler_state(), SchedulerState::Halted);
    assert_eq!(harness.provider.scheduler().next_due(), None);

    assert_eq!(harness.provider.tick(start + Duration::from_secs(600)), 0);

    harness.explicit_cycle(false, start + Duration::from_secs(601));
    assert_eq!(harness.provider.scheduler_state(), SchedulerState::Running);
    assert_eq!(harness.notice_count(), 1);
    let labels: Vec<_> = harness
        .provider
        .children(None)
        .iter()
        .map(Artifact::label)
        .collect();
    assert_eq!(labels, vec!["TASKS (0)", "INCIDENTS (1)", "REQUIREMENTS (1)"]);
}

#[test]
fn every_cycle_emits_exactly_one_root_change() {
    let start = Instant::now();
    let mut harness = Harness::new(0, start);

    harness.explicit_cycle(false, start);
    harness.explicit_cycle(true, start);
    harness.explicit_cycle(false, start);

    assert_eq!(harness.change_count(), 3);
    assert!(harness.changes.lock().expect("lock").iter().all(|c| *c == TreeChange::Root));
}

#[test]
fn disabled_timer_only_refreshes_on_demand() {
    let start = Instant::now();
    let mut harness = Harness::new(0, start);

    assert_eq!(harness.provider.tick(start + Duration::from_secs(3600)), 0);
    assert_eq!(harness.change_count(), 0);
    assert_eq!(harness.provider.scheduler_state(), SchedulerState::Running);

    harness.explicit_cycle(false, start + Duration::from_secs(3601));
    assert_eq!(harness.change_count(), 1);
    assert_eq!(harness.provider.lookup("RQ", 1).map(|a| a.item_id()), Some(1));
}

#[test]
fn short_interval_is_clamped_to_five_seconds() {
    let start = Instant::now();
    let mut harness = Harness::new(3, start);

    harness.provider.tick(start + Duration::from_secs(3));
    assert_eq!(harness.change_count(), 0);
    harness.provider.tick(start + Duration::from_secs(5));
    assert_eq!(harness.change_count(), 1);
}

#[test]
fn lookup_of_unknown_id_after_refresh_is_none() {
    let start = Instant::now();
    let mut harness = Harness::new(60, start);
    harness.explicit_cycle(false, start);

    assert!(harness.provider.lookup("IN", 8).is_none());
    assert!(harness.provider.lookup_key("TK:1").expect("valid key").is_none());
    assert!(!harness.provider.detail("RQ:404").expect("valid key").found);
}
