// crates/framefuse-media/src/helpers/timeout.rs
//
// Run a blocking closure on its own thread with a wall-clock deadline.
//
// Asset opens (network mounts, cold disks, misbehaving demuxers) can hang
// far past any useful budget. FFmpeg offers no portable open timeout, so the
// open runs on a detached thread and the caller waits on a channel with
// recv_timeout. On timeout the worker thread is abandoned; it finishes (or
// hangs) in the background and its result is dropped on the floor.

use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;

/// Outcome of a deadline-bounded operation.
pub enum Deadline<T> {
    Done(T),
    TimedOut,
}

/// Run `f` on a fresh thread, waiting at most `limit` for its result.
pub fn run_with_deadline<T, F>(limit: Duration, f: F) -> Deadline<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        // The receiver may be gone if we timed out; ignore the send error.
        let _ = tx.send(f());
    });
    match rx.recv_timeout(limit) {
        Ok(v) => Deadline::Done(v),
        Err(_) => Deadline::TimedOut,
    }
}
