//! Fetch execution.
//!
//! A [`Dispatch`] runs each [`CollectionRequest`] somewhere and reports the
//! [`Completion`] over an mpsc channel. Only the thread owning the receiver
//! ever touches coordinator state.

use serde_json::Value;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use crate::error::FetchError;
use crate::model::artifact::Category;
use crate::sync::cycle::CycleId;

/// One collection to fetch on behalf of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionRequest {
    pub cycle: CycleId,
    pub category: Category,
}

/// Raw response of a collection fetch. Status and body are classified by the
/// coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl FetchResponse {
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    #[must_use]
    pub const fn status(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// Result of one request, tagged with the cycle that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub cycle: CycleId,
    pub category: Category,
    pub result: Result<FetchResponse, FetchError>,
}

impl Completion {
    #[must_use]
    pub const fn new(request: CollectionRequest, result: Result<FetchResponse, FetchError>) -> Self {
        Self {
            cycle: request.cycle,
            category: request.category,
            result,
        }
    }
}

/// The "fetch one JSON collection" capability.
pub trait CollectionFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FetchError`] when no response could be obtained.
    fn fetch(&self, request: &CollectionRequest) -> Result<FetchResponse, FetchError>;
}

impl<F> CollectionFetcher for F
where
    F: Fn(&CollectionRequest) -> Result<FetchResponse, FetchError> + Send + Sync,
{
    fn fetch(&self, request: &CollectionRequest) -> Result<FetchResponse, FetchError> {
        self(request)
    }
}

pub trait Dispatch: Send {
    /// Run `request` and eventually send exactly one completion on `tx`.
    fn dispatch(&self, request: CollectionRequest, tx: &Sender<Completion>);
}

fn deliver(tx: &Sender<Completion>, completion: Completion) {
    let category = completion.category;
    if tx.send(completion).is_err() {
        tracing::debug!(%category, "completion receiver dropped; discarding result");
    }
}

/// One named worker thread per request.
pub struct ThreadDispatcher<F> {
    fetcher: Arc<F>,
}

impl<F> ThreadDispatcher<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }
}

impl<F> Dispatch for ThreadDispatcher<F>
where
    F: CollectionFetcher + 'static,
{
    fn dispatch(&self, request: CollectionRequest, tx: &Sender<Completion>) {
        let fetcher = Arc::clone(&self.fetcher);
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("spira-fetch-{}", request.category.collection()))
            .spawn(move || {
                let result = fetcher.fetch(&request);
                deliver(&worker_tx, Completion::new(request, result));
            });

        if let Err(err) = spawned {
            tracing::warn!(category = %request.category, error = %err, "failed to spawn fetch worker");
            deliver(
                tx,
                Completion::new(request, Err(FetchError::Transport(err.to_string()))),
            );
        }
    }
}

/// Runs the fetch on the calling thread before returning.
pub struct InlineDispatcher<F> {
    fetcher: F,
}

impl<F> InlineDispatcher<F> {
    pub const fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: CollectionFetcher> Dispatch for InlineDispatcher<F> {
    fn dispatch(&self, request: CollectionRequest, tx: &Sender<Completion>) {
        deliver(tx, Completion::new(request, self.fetcher.fetch(&request)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    fn echo(request: &CollectionRequest) -> Result<FetchResponse, FetchError> {
        Ok(FetchResponse::ok(json!([{ "collection": request.category.collection() }])))
    }

    #[test]
    fn inline_dispatch_delivers_before_returning() {
        let (tx, rx) = mpsc::channel();
        let request = CollectionRequest {
            cycle: CycleId::new(3),
            category: Category::Incident,
        };
        InlineDispatcher::new(echo).dispatch(request, &tx);

        let completion = rx.try_recv().expect("completion already queued");
        assert_eq!(completion.cycle, CycleId::new(3));
        assert_eq!(completion.category, Category::Incident);
        assert!(completion.result.is_ok());
    }

    #[test]
    fn thread_dispatch_delivers_one_completion_per_request() {
        let (tx, rx) = mpsc::channel();
        let dispatcher = ThreadDispatcher::new(|request: &CollectionRequest| {
            let name = thread::current().name().map(str::to_string);
            assert_eq!(
                name.as_deref(),
                Some(format!("spira-fetch-{}", request.category.collection()).as_str())
            );
            echo(request)
        });
        for category in Category::ALL {
            dispatcher.dispatch(
                CollectionRequest {
                    cycle: CycleId::new(1),
                    category,
                },
                &tx,
            );
        }

        let mut seen: Vec<_> = (0..3)
            .map(|_| {
                rx.recv_timeout(Duration::from_secs(5))
                    .expect("worker should report")
            })
            .map(|completion| {
                assert!(completion.result.is_ok());
                completion.category
            })
            .collect();
        seen.sort();
        assert_eq!(seen, Category::ALL.to_vec());
    }

    #[test]
    fn dropped_receiver_does_not_panic_worker() {
        let (tx, rx) = mpsc::channel::<Completion>();
        drop(rx);
        InlineDispatcher::new(echo).dispatch(
            CollectionRequest {
                cycle: CycleId::new(1),
                category: Category::Task,
            },
            &tx,
        );
    }
}
