//! Join and failure policy for refresh cycles.
//!
//! The coordinator never performs I/O. [`FetchCoordinator::begin_cycle`]
//! hands back the requests to run; the owner feeds each [`Completion`] to
//! [`FetchCoordinator::complete`] one at a time and acts on the returned
//! [`CycleOutcome`] (notify listeners, halt the timer).

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorCode, FetchError};
use crate::model::artifact::{Artifact, Category, PerCategory};
use crate::notify::FailureNotice;
use crate::sync::cycle::{CycleId, CycleRecord, FailureRecord};
use crate::sync::dispatch::{CollectionRequest, Completion, FetchResponse};
use crate::tree::{TreeSnapshot, TreeStore};

/// Requests to run for a freshly started cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePlan {
    pub cycle: CycleId,
    pub requests: Vec<CollectionRequest>,
    /// Present when the cycle settled without fetching anything.
    pub settled: Option<CycleOutcome>,
}

/// What applying one completion did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The completion belongs to a superseded cycle and was dropped.
    Stale,
    /// The category had already settled in this cycle.
    Duplicate,
    /// Other categories are still outstanding. `tree_cleared` is set on the
    /// cycle's first failure, when the empty tree was published.
    Pending { tree_cleared: bool },
    /// The cycle joined successfully and its tree was published.
    Published { generation: CycleId },
    /// The cycle settled with at least one failure.
    Settled {
        tree_cleared: bool,
        failed: Vec<Category>,
        notice: Option<FailureNotice>,
    },
}

impl CycleOutcome {
    /// The published tree was replaced, so listeners need a root change.
    #[must_use]
    pub const fn tree_changed(&self) -> bool {
        match self {
            Self::Stale | Self::Duplicate => false,
            Self::Pending { tree_cleared } | Self::Settled { tree_cleared, .. } => *tree_cleared,
            Self::Published { .. } => true,
        }
    }

    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Published { .. } | Self::Settled { .. })
    }

    #[must_use]
    pub const fn notice(&self) -> Option<&FailureNotice> {
        match self {
            Self::Settled { notice, .. } => notice.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchCoordinator {
    store: TreeStore,
    cycle: Option<CycleRecord>,
    last_id: CycleId,
    failures: FailureRecord,
    last_settled_failed: Vec<Category>,
}

impl FetchCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn store(&self) -> &TreeStore {
        &self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        self.store.snapshot()
    }

    #[must_use]
    pub const fn failures(&self) -> &FailureRecord {
        &self.failures
    }

    /// Categories that failed in the most recently settled cycle. Unlike
    /// [`FailureRecord::slots`] this survives the reset that follows a
    /// confirmed total failure.
    #[must_use]
    pub fn last_settled_failed(&self) -> &[Category] {
        &self.last_settled_failed
    }

    /// Id of the in-flight cycle, if one has not settled yet.
    #[must_use]
    pub fn in_flight(&self) -> Option<CycleId> {
        self.cycle
            .as_ref()
            .filter(|record| !record.is_settled())
            .map(|record| record.id)
    }

    /// Start a new cycle. Any cycle still in flight is superseded and its
    /// late completions will be reported as [`CycleOutcome::Stale`].
    pub fn begin_cycle(&mut self, explicit: bool, visible: PerCategory<bool>) -> CyclePlan {
        if let Some(previous) = self.in_flight() {
            debug!(%previous, "superseding unsettled cycle");
        }

        let id = self.last_id.next();
        self.last_id = id;
        let record = CycleRecord::new(id, visible);
        let requests = Category::ALL
            .into_iter()
            .filter(|category| !*record.done.get(*category))
            .map(|category| CollectionRequest { cycle: id, category })
            .collect::<Vec<_>>();
        debug!(cycle = %id, explicit, requests = requests.len(), "refresh cycle started");

        let settled = record.is_settled();
        self.cycle = Some(record);
        let settled = settled.then(|| self.settle());

        CyclePlan {
            cycle: id,
            requests,
            settled,
        }
    }

    /// Apply one completion as a single step.
    pub fn complete(&mut self, completion: Completion) -> CycleOutcome {
        let Completion {
            cycle,
            category,
            result,
        } = completion;

        let Some(record) = self.cycle.as_mut().filter(|record| record.id == cycle) else {
            debug!(%cycle, %category, "discarding completion from superseded cycle");
            return CycleOutcome::Stale;
        };
        if *record.done.get(category) {
            debug!(%cycle, %category, "ignoring duplicate completion");
            return CycleOutcome::Duplicate;
        }
        record.done.set(category, true);

        let first_failure = match result.and_then(|response| parse_collection(category, response)) {
            Ok(items) => {
                debug!(%cycle, %category, items = items.len(), "collection fetched");
                record.staged.set(category, items);
                self.failures.slots.set(category, false);
                false
            }
            Err(err) => {
                warn!(%cycle, %category, error = %err, "collection fetch failed");
                record.failed.set(category, true);
                record.staged.set(category, Vec::new());
                self.failures.slots.set(category, true);
                !std::mem::replace(&mut record.poisoned, true)
            }
        };

        if first_failure {
            self.store.publish(TreeSnapshot::cleared(cycle));
        }

        let settled = self.cycle.as_ref().is_some_and(CycleRecord::is_settled);
        if !settled {
            return CycleOutcome::Pending {
                tree_cleared: first_failure,
            };
        }

        match self.settle() {
            CycleOutcome::Settled { failed, notice, .. } => CycleOutcome::Settled {
                tree_cleared: first_failure,
                failed,
                notice,
            },
            outcome => outcome,
        }
    }

    fn settle(&mut self) -> CycleOutcome {
        let Some(record) = self.cycle.as_mut() else {
            return CycleOutcome::Stale;
        };

        self.last_settled_failed = record.failed_categories();
        if !record.poisoned {
            let generation = record.id;
            let snapshot =
                TreeSnapshot::build(generation, std::mem::take(&mut record.staged), &record.visible);
            info!(
                %generation,
                items = snapshot.item_count(),
                headers = snapshot.headers().len(),
                "published tree generation"
            );
            self.store.publish(snapshot);
            self.failures.consecutive_total = 0;
            return CycleOutcome::Published { generation };
        }

        let failed = self.last_settled_failed.clone();
        let notice = if record.every_fetch_failed() {
            self.failures.consecutive_total += 1;
            self.confirmed_total_failure()
        } else {
            self.failures.consecutive_total = 0;
            None
        };

        CycleOutcome::Settled {
            tree_cleared: false,
            failed,
            notice,
        }
    }

    fn confirmed_total_failure(&mut self) -> Option<FailureNotice> {
        if self.failures.consecutive_total < 2 {
            debug!("every fetch failed; waiting for the next cycle to confirm");
            return None;
        }
        self.failures.reset();
        error!(code = %ErrorCode::TotalFetchFailure, "every collection fetch failed twice in a row");
        Some(FailureNotice::new(
            ErrorCode::TotalFetchFailure,
            "Unable to retrieve requirements, tasks or incidents from Spira",
        ))
    }
}

/// Classify a raw response and map its records. Records that cannot become
/// artifacts are skipped.
fn parse_collection(category: Category, response: FetchResponse) -> Result<Vec<Artifact>, FetchError> {
    if response.status >= 400 {
        return Err(FetchError::Status(response.status));
    }
    let Some(Value::Array(records)) = response.body else {
        return Err(FetchError::MissingBody);
    };

    Ok(records
        .iter()
        .filter_map(|record| match Artifact::from_record(category, record) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(%category, error = %err, "skipping malformed record");
                None
            }
        })
        .collect())
}
