//! Manually-advanced [`railyard_core::Clock`] (spec §3.4), so retry-delay
//! and timeout logic can be exercised without a real sleep. Grounded on
//! the `oneshot`-per-waiter shape `railyard-fsstore::server::FsStoreServer`
//! uses for its own queued grants: each `sleep()` call registers a waiter
//! with a deadline, and `advance()` fires every waiter whose deadline has
//! passed.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use railyard_core::Clock;
use tokio::sync::oneshot;

struct Waiter {
    deadline_millis: u64,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
pub struct FakeClock {
    state: Mutex<FakeClockState>,
}

#[derive(Default)]
struct FakeClockState {
    now_millis: u64,
    waiters: Vec<Waiter>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(start_millis: u64) -> Self {
        Self {
            state: Mutex::new(FakeClockState {
                now_millis: start_millis,
                waiters: Vec::new(),
            }),
        }
    }

    /// Move time forward, waking every `sleep()` whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap();
        state.now_millis += by.as_millis() as u64;
        let now = state.now_millis;
        state.waiters.retain_mut(|waiter| {
            if waiter.deadline_millis > now {
                return true;
            }
            // `wake` is consumed by swapping in a closed channel; the
            // sender side doesn't need a value, only the send to fire.
            let (dummy, _) = oneshot::channel();
            let sender = std::mem::replace(&mut waiter.wake, dummy);
            let _ = sender.send(());
            false
        });
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now_millis(&self) -> u64 {
        self.state.lock().unwrap().now_millis
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().unwrap();
            let deadline = state.now_millis + duration.as_millis() as u64;
            state.waiters.push(Waiter {
                deadline_millis: deadline,
                wake: tx,
            });
        }
        let _ = rx.await;
    }
}
