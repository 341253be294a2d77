//! `RequestQueue`: the single priority queue shared by every pipeline's
//! fetches. Callers submit work keyed by a stable id, the queue dedupes,
//! orders by priority, and dispatches up to `concurrency` requests at once on
//! the parked tokio runtime (`helpers::async_helper`).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{EngineError, Result};
use crate::helpers::spawn_detached;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapKey {
    priority: u64,
    id: u64,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; a higher submission counter (newer
        // request) sorts first, giving LIFO-under-pressure behaviour.
        self.priority.cmp(&other.priority)
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Entry<T> {
    should_execute: Box<dyn Fn() -> bool + Send + Sync>,
    run: Option<Box<dyn FnOnce() -> BoxFuture<T> + Send>>,
    waiters: Vec<oneshot::Sender<Result<T>>>,
}

struct State<T> {
    heap: BinaryHeap<HeapKey>,
    entries: HashMap<u64, Entry<T>>,
}

struct Inner<T> {
    concurrency: usize,
    counter: AtomicU64,
    in_flight: AtomicUsize,
    state: Mutex<State<T>>,
}

/// Cheap to clone: every clone shares the same underlying queue.
pub struct RequestQueue<T: Clone + Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + 'static> Clone for RequestQueue<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone + Send + 'static> RequestQueue<T> {
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency,
                counter: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                state: Mutex::new(State { heap: BinaryHeap::new(), entries: HashMap::new() }),
            }),
        }
    }

    /// Submits work under `id`. If `id` is already queued or in flight, the
    /// returned future resolves alongside the original request instead of
    /// re-running it. `should_execute` is polled immediately before dispatch
    /// (not at submission time); a `false` result rejects with
    /// [`EngineError::Cancelled`].
    pub fn enqueue<F, Fut>(
        &self,
        id: u64,
        should_execute: impl Fn() -> bool + Send + Sync + 'static,
        request: F,
    ) -> BoxFuture<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.waiters.push(tx);
            } else {
                let priority = self.inner.counter.fetch_add(1, AtomicOrdering::SeqCst);
                state.entries.insert(
                    id,
                    Entry {
                        should_execute: Box::new(should_execute),
                        run: Some(Box::new(move || Box::pin(request()) as BoxFuture<T>)),
                        waiters: vec![tx],
                    },
                );
                state.heap.push(HeapKey { priority, id });
            }
        }
        self.try_dispatch();

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Cancelled),
            }
        })
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().unwrap().entries.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.load(AtomicOrdering::SeqCst)
    }

    /// Pops as many ready entries as the concurrency budget allows and
    /// spawns them. Entries whose `should_execute` predicate now fails are
    /// resolved inline with `Cancelled` and skipped — this is how a node
    /// that went invisible while queued gets dropped.
    fn try_dispatch(&self) {
        loop {
            if self.inner.in_flight.load(AtomicOrdering::SeqCst) >= self.inner.concurrency {
                return;
            }
            let dispatched = {
                let mut state = self.inner.state.lock().unwrap();
                let Some(key) = state.heap.pop() else { return };
                let Some(entry) = state.entries.get(&key.id) else { continue };
                if !(entry.should_execute)() {
                    let entry = state.entries.remove(&key.id).unwrap();
                    drop(state);
                    for w in entry.waiters {
                        let _ = w.send(Err(EngineError::Cancelled));
                    }
                    continue;
                }
                let mut entry = state.entries.remove(&key.id).unwrap();
                let run = entry.run.take().expect("entry dispatched twice");
                (run, entry.waiters)
            };
            self.inner.in_flight.fetch_add(1, AtomicOrdering::SeqCst);
            let (run, waiters) = dispatched;
            let inner = self.inner.clone();
            spawn_detached(async move {
                let result = run().await;
                for w in waiters {
                    let _ = w.send(result.clone());
                }
                inner.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
                RequestQueue { inner }.try_dispatch();
            });
        }
    }
}
