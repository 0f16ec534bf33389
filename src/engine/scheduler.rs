//! Cancellable scheduled poll loop.
//!
//! One dedicated thread per scheduled loop. The inter-poll sleep waits on a
//! channel that is disconnected on cancellation, so `stop` wakes a sleeping
//! loop immediately. The token is checked after the sleep, inside the cycle
//! (after the query, before dispatch) and before sleeping again.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use uuid::Uuid;

/// Cooperative cancellation flag shared with a running loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Returns true once the owning handle was cancelled or dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Handle to a pending scheduled loop. Dropping it cancels the loop.
///
/// The loop thread is detached, never joined: a sink called from the loop
/// may itself stop the engine, and joining there would deadlock.
#[derive(Debug)]
pub(crate) struct ScheduledPoll {
    id: Uuid,
    token: CancelToken,
    wake: Option<Sender<()>>,
}

impl ScheduledPoll {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Cancels the loop; equivalent to dropping the handle.
    pub(crate) fn cancel(self) {
        tracing::debug!(loop_id = %self.id, "scheduled poll cancelled");
    }
}

impl Drop for ScheduledPoll {
    fn drop(&mut self) {
        self.token.cancel();
        // Disconnecting the channel wakes a sleeping loop.
        self.wake.take();
    }
}

/// Spawns a loop that runs `cycle` immediately, then every `interval` until
/// cancelled.
pub(crate) fn spawn<F>(interval: Duration, cycle: F) -> io::Result<ScheduledPoll>
where
    F: FnMut(&CancelToken) + Send + 'static,
{
    let id = Uuid::new_v4();
    let token = CancelToken::default();
    let (wake_tx, wake_rx) = bounded::<()>(0);

    let loop_token = token.clone();
    thread::Builder::new()
        .name("logbridge-poll".to_string())
        .spawn(move || poll_loop(id, interval, &loop_token, &wake_rx, cycle))?;

    Ok(ScheduledPoll {
        id,
        token,
        wake: Some(wake_tx),
    })
}

fn poll_loop<F>(id: Uuid, interval: Duration, token: &CancelToken, wake: &Receiver<()>, mut cycle: F)
where
    F: FnMut(&CancelToken),
{
    tracing::debug!(loop_id = %id, interval_ms = interval.as_millis() as u64, "scheduled poll loop started");
    loop {
        if token.is_cancelled() {
            break;
        }
        cycle(token);
        if token.is_cancelled() {
            break;
        }
        select! {
            recv(wake) -> _ => break,
            default(interval) => {}
        }
    }
    tracing::debug!(loop_id = %id, "scheduled poll loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_until(deadline: Duration, mut f: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        f()
    }

    #[test]
    fn runs_immediately_then_repeats() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = spawn(Duration::from_millis(10), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) >= 3));
        handle.cancel();
    }

    #[test]
    fn cancel_wakes_sleeping_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = spawn(Duration::from_secs(3600), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));
        let token = handle.token.clone();
        drop(handle);
        assert!(token.is_cancelled());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_observed_mid_cycle_stops_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = bounded::<()>(1);
        let (release_tx, release_rx) = bounded::<()>(1);

        let c = Arc::clone(&count);
        let handle = spawn(Duration::from_millis(1), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            let _ = entered_tx.try_send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(2));
        })
        .unwrap();

        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        drop(handle);
        release_tx.send(()).unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
