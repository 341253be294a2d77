//! One parked multi-thread tokio runtime for the whole process. Fetches (HTTP
//! via `reqwest`, and any other future-returning source call) run on this
//! runtime; they must never mutate engine state directly — results flow back
//! to the update thread through a `helpers::channel`.

use core::future::Future;
use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle};

static HANDLE: Lazy<Handle> = Lazy::new(|| {
    let rt = Builder::new_multi_thread()
        .worker_threads(num_cpus::get().clamp(2, 8))
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build tokio runtime");

    let handle = rt.handle().clone();
    // Park the owning runtime forever on a background thread so it never
    // drops out from under spawned tasks.
    std::thread::spawn(move || rt.block_on(futures::future::pending::<()>()));
    handle
});

/// Spawn a future onto the shared background runtime without awaiting it.
pub fn spawn_detached<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    HANDLE.spawn(fut);
}

/// Borrow the shared runtime's handle, e.g. to call `Handle::block_on` from a
/// plain OS thread (worker threads are spawned with `std::thread::spawn`, not
/// `tokio::spawn`, so they need an explicit handle to drive async source
/// calls like `reqwest`).
pub fn runtime_handle() -> Handle {
    HANDLE.clone()
}

pub async fn yield_now() {
    tokio::task::yield_now().await;
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
