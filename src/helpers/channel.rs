//! Thin wrapper over `crossbeam-channel` giving the rest of the crate a single
//! `Sender`/`Receiver` vocabulary regardless of which MPMC primitive backs it.
//! This engine only ever runs native, off any browser thread model.

pub type Sender<T> = crossbeam_channel::Sender<T>;
pub type Receiver<T> = crossbeam_channel::Receiver<T>;

/// Bounded channel; `capacity` is a back-pressure hint, not a hard requirement
/// on callers (unlike an async mpsc, `try_send` on a full channel just fails).
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(capacity.max(1))
}
