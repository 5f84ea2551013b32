//! Debounce controller.
//!
//! Turns a rapid stream of raw input values into a lower-rate stream of
//! committed values. A value is committed no sooner than `delay` after the
//! last `submit`; superseded values are never committed, and committing the
//! value that is already committed is a no-op.
//!
//! [`DebounceState`] is the clock-driven state machine. [`Debouncer`] wraps
//! it with a tokio timer so consumers can simply `await` the next value.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// Debounce state machine driven by explicit instants.
#[derive(Debug, Clone)]
pub struct DebounceState<V> {
    delay: Duration,
    pending: Option<(V, Instant)>,
    committed: V,
}

impl<V: Clone + PartialEq> DebounceState<V> {
    /// Creates a state with `initial` already committed.
    pub fn new(delay: Duration, initial: V) -> Self {
        Self {
            delay,
            pending: None,
            committed: initial,
        }
    }

    /// Records a raw value at `now`, superseding any pending one.
    pub fn submit(&mut self, value: V, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Commits the pending value if its deadline has passed.
    ///
    /// Returns the value only when it differs from the committed one.
    pub fn poll(&mut self, now: Instant) -> Option<V> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return None,
        }
        let (value, _) = self.pending.take()?;
        self.commit(value)
    }

    /// Drops any pending value and commits `value` immediately.
    pub fn commit_now(&mut self, value: V) -> Option<V> {
        self.pending = None;
        self.commit(value)
    }

    /// Drops any pending value without committing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Deadline of the pending value, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Whether a value is waiting for its deadline.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Last committed value.
    pub fn committed(&self) -> &V {
        &self.committed
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn commit(&mut self, value: V) -> Option<V> {
        if value == self.committed {
            return None;
        }
        self.committed = value.clone();
        Some(value)
    }
}

/// Async debouncer.
///
/// `submit` may be called from anywhere; a single consumer awaits
/// [`Debouncer::next`]. After [`Debouncer::close`] nothing more is emitted.
#[derive(Debug)]
pub struct Debouncer<V> {
    state: Mutex<DebounceState<V>>,
    closed: Mutex<bool>,
    notify: Notify,
}

impl<V: Clone + PartialEq + Send> Debouncer<V> {
    /// Creates a debouncer with `initial` already committed.
    pub fn new(delay: Duration, initial: V) -> Self {
        Self {
            state: Mutex::new(DebounceState::new(delay, initial)),
            closed: Mutex::new(false),
            notify: Notify::new(),
        }
    }

    /// Records a raw input value.
    pub fn submit(&self, value: V) {
        if *self.closed.lock() {
            return;
        }
        self.state.lock().submit(value, Instant::now());
        self.notify.notify_one();
    }

    /// Cancels any pending value and commits `value` now.
    ///
    /// Returns the value if it differs from the last committed one. The
    /// value is handed to the caller, not to `next`.
    pub fn commit_now(&self, value: V) -> Option<V> {
        let committed = self.state.lock().commit_now(value);
        self.notify.notify_one();
        committed
    }

    /// Drops any pending value without emitting it.
    pub fn cancel(&self) {
        self.state.lock().cancel();
        self.notify.notify_one();
    }

    /// Cancels pending input and stops `next` for good (teardown).
    pub fn close(&self) {
        *self.closed.lock() = true;
        self.cancel();
    }

    /// Whether a value is waiting for its deadline.
    pub fn is_pending(&self) -> bool {
        self.state.lock().is_pending()
    }

    /// Last committed value.
    pub fn committed(&self) -> V {
        self.state.lock().committed().clone()
    }

    /// Waits for the next committed value. Returns `None` once closed.
    pub async fn next(&self) -> Option<V> {
        loop {
            let deadline = {
                if *self.closed.lock() {
                    return None;
                }
                let mut state = self.state.lock();
                if let Some(value) = state.poll(Instant::now()) {
                    trace!(delay_ms = state.delay().as_millis() as u64, "debounced value committed");
                    return Some(value);
                }
                state.deadline()
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const D: Duration = Duration::from_millis(500);

    #[test]
    fn coalesces_to_last_value() {
        let t0 = Instant::now();
        let mut state = DebounceState::new(D, String::new());
        state.submit("a".into(), t0);
        state.submit("ac".into(), t0 + Duration::from_millis(100));
        state.submit("acme".into(), t0 + Duration::from_millis(300));

        assert_eq!(state.poll(t0 + Duration::from_millis(700)), None);
        assert_eq!(state.poll(t0 + Duration::from_millis(800)), Some("acme".into()));
        assert_eq!(state.poll(t0 + Duration::from_millis(2000)), None);
    }

    #[test]
    fn identical_value_is_noop() {
        let t0 = Instant::now();
        let mut state = DebounceState::new(D, String::new());
        state.submit("x".into(), t0);
        assert_eq!(state.poll(t0 + D), Some("x".into()));

        state.submit("x".into(), t0 + D);
        assert_eq!(state.poll(t0 + D * 3), None);
        assert!(!state.is_pending());
    }

    #[test]
    fn retyping_back_to_initial_emits_nothing() {
        let t0 = Instant::now();
        let mut state = DebounceState::new(D, String::new());
        state.submit("a".into(), t0);
        state.submit(String::new(), t0 + Duration::from_millis(200));
        assert_eq!(state.poll(t0 + Duration::from_millis(700)), None);
    }

    #[test]
    fn cancel_and_commit_now() {
        let t0 = Instant::now();
        let mut state = DebounceState::new(D, String::from("old"));
        state.submit("new".into(), t0);
        state.cancel();
        assert_eq!(state.poll(t0 + D), None);
        assert_eq!(state.committed(), "old");

        state.submit("typed".into(), t0);
        assert_eq!(state.commit_now(String::new()), Some(String::new()));
        assert_eq!(state.poll(t0 + D), None);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_emits_once_after_delay() {
        let debouncer = Arc::new(Debouncer::new(D, String::new()));
        let start = Instant::now();

        let consumer = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move {
                let value = debouncer.next().await;
                (value, Instant::now())
            })
        };

        debouncer.submit("ac".into());
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.submit("acme".into());
        assert!(debouncer.is_pending());

        let (value, at) = consumer.await.unwrap();
        assert_eq!(value.as_deref(), Some("acme"));
        let waited = at - start;
        assert!(waited >= Duration::from_millis(700), "emitted after {waited:?}");
        assert!(waited < Duration::from_millis(710), "emitted after {waited:?}");
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_debouncer_never_emits() {
        let debouncer = Arc::new(Debouncer::new(D, String::new()));
        let consumer = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.next().await })
        };

        debouncer.submit("pending".into());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.close();

        assert_eq!(consumer.await.unwrap(), None);
        debouncer.submit("after".into());
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.committed(), "");
    }
}
