//! Refresh cycles: three parallel collection fetches joined into one
//! published generation.
//!
//! - [`cycle`]: generation ids and the per-cycle / cross-cycle records.
//! - [`coordinator`]: applies completions, enforces the join rule and the
//!   failure policy.
//! - [`dispatch`]: runs fetch requests on worker threads or inline.

pub mod coordinator;
pub mod cycle;
pub mod dispatch;

pub use coordinator::{CyclePlan, CycleOutcome, FetchCoordinator};
pub use cycle::CycleId;
pub use dispatch::{
    CollectionFetcher, CollectionRequest, Completion, Dispatch, FetchResponse, InlineDispatcher,
    ThreadDispatcher,
};
