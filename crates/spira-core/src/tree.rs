//! Published tree state.
//!
//! A [`TreeSnapshot`] is one complete generation: three category collections
//! plus the headers derived from them. Readers hold an `Arc` to a snapshot,
//! so a refresh in progress can never show them a half-updated tree.

use serde::Serialize;
use std::sync::Arc;

use crate::model::artifact::{Artifact, ArtifactKey, Category, PerCategory};
use crate::sync::cycle::CycleId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    generation: CycleId,
    headers: Vec<Artifact>,
    requirements: Vec<Artifact>,
    tasks: Vec<Artifact>,
    incidents: Vec<Artifact>,
}

impl TreeSnapshot {
    /// The tree before any cycle has completed.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            generation: CycleId::INITIAL,
            headers: Vec::new(),
            requirements: Vec::new(),
            tasks: Vec::new(),
            incidents: Vec::new(),
        }
    }

    /// An empty tree tagged with `generation`, published on failure.
    #[must_use]
    pub fn cleared(generation: CycleId) -> Self {
        Self {
            generation,
            ..Self::empty()
        }
    }

    /// Build a generation and derive its headers.
    ///
    /// Headers appear in Tasks, Incidents, Requirements order, one per
    /// visible category, whether or not that category has items.
    #[must_use]
    pub fn build(
        generation: CycleId,
        mut collections: PerCategory<Vec<Artifact>>,
        visible: &PerCategory<bool>,
    ) -> Self {
        let headers = Category::HEADER_ORDER
            .into_iter()
            .filter(|category| *visible.get(*category))
            .map(|category| Artifact::header(category, collections.get(category).len()))
            .collect();

        Self {
            generation,
            headers,
            requirements: std::mem::take(collections.get_mut(Category::Requirement)),
            tasks: std::mem::take(collections.get_mut(Category::Task)),
            incidents: std::mem::take(collections.get_mut(Category::Incident)),
        }
    }

    #[must_use]
    pub const fn generation(&self) -> CycleId {
        self.generation
    }

    #[must_use]
    pub fn headers(&self) -> &[Artifact] {
        &self.headers
    }

    #[must_use]
    pub fn collection(&self, category: Category) -> &[Artifact] {
        match category {
            Category::Requirement => &self.requirements,
            Category::Task => &self.tasks,
            Category::Incident => &self.incidents,
        }
    }

    /// Root → headers; header → its items; item → nothing.
    #[must_use]
    pub fn children(&self, node: Option<&Artifact>) -> Vec<Artifact> {
        match node {
            None => self.headers.clone(),
            Some(node) if node.is_header() => self.collection(node.category()).to_vec(),
            Some(_) => Vec::new(),
        }
    }

    /// Find an item by shorthand token and id. Unknown tokens and ids not in
    /// this generation are `None`.
    #[must_use]
    pub fn lookup(&self, token: &str, item_id: i64) -> Option<&Artifact> {
        let category = Category::from_token(token)?;
        self.find(ArtifactKey { category, item_id })
    }

    #[must_use]
    pub fn find(&self, key: ArtifactKey) -> Option<&Artifact> {
        self.collection(key.category)
            .iter()
            .find(|artifact| artifact.item_id() == key.item_id)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.requirements.len() + self.tasks.len() + self.incidents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.item_count() == 0
    }
}

/// Holder of the latest published snapshot.
#[derive(Debug, Clone)]
pub struct TreeStore {
    current: Arc<TreeSnapshot>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self {
            current: Arc::new(TreeSnapshot::empty()),
        }
    }
}

impl TreeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published tree. Snapshots older than the current one are
    /// rejected and `false` is returned.
    pub fn publish(&mut self, snapshot: TreeSnapshot) -> bool {
        if snapshot.generation < self.current.generation {
            tracing::debug!(
                offered = %snapshot.generation,
                current = %self.current.generation,
                "rejecting snapshot from superseded cycle"
            );
            return false;
        }
        self.current = Arc::new(snapshot);
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        Arc::clone(&self.current)
    }

    #[must_use]
    pub fn current(&self) -> &TreeSnapshot {
        &self.current
    }
}
