use serde::Serialize;
use std::fmt;

use crate::model::artifact::{Artifact, Category, PerCategory};

/// Monotonic id of one refresh cycle. Published snapshots carry the id of
/// the cycle that produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CycleId(u64);

impl CycleId {
    /// Generation of the tree before any cycle ran.
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of the one in-flight cycle.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: CycleId,
    pub visible: PerCategory<bool>,
    pub done: PerCategory<bool>,
    pub failed: PerCategory<bool>,
    pub staged: PerCategory<Vec<Artifact>>,
    /// Set once the published tree was cleared for a failure in this cycle.
    pub poisoned: bool,
}

impl CycleRecord {
    /// Fresh record; hidden categories start out done with nothing staged.
    #[must_use]
    pub fn new(id: CycleId, visible: PerCategory<bool>) -> Self {
        let done = PerCategory::from_fn(|category| !*visible.get(category));
        Self {
            id,
            visible,
            done,
            failed: PerCategory::default(),
            staged: PerCategory::default(),
            poisoned: false,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.done.all(|done| *done)
    }

    #[must_use]
    pub fn failed_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| *self.failed.get(*category))
            .collect()
    }

    /// Every fetched category failed. A cycle with nothing to fetch never
    /// counts as a failure.
    #[must_use]
    pub fn every_fetch_failed(&self) -> bool {
        let requested: Vec<_> = Category::ALL
            .into_iter()
            .filter(|category| *self.visible.get(*category))
            .collect();
        !requested.is_empty() && requested.iter().all(|category| *self.failed.get(*category))
    }
}

/// Failure history that survives across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureRecord {
    /// Set when a category fails, cleared when it next succeeds.
    pub slots: PerCategory<bool>,
    /// Settled cycles in a row in which every fetch failed.
    pub consecutive_total: u32,
}

impl FailureRecord {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
