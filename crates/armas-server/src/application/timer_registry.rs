//! TimerRegistry: at most one pending timed block per device.
//!
//! Each pending entry owns a Tokio task that sleeps until the deadline and then
//! runs the expiry callback (in production: "block this device").  The map and
//! the tasks are kept consistent by a generation number:
//!
//! ```text
//! set(mac)     ── insert {generation: n, task} ── abort previous task, if any
//!
//! task n wakes ── lock map ── entry for mac has generation n?
//!                                 │yes                     │no
//!                                 ▼                        ▼
//!                      remove entry, run callback    stale, do nothing
//! ```
//!
//! Aborting a replaced or cancelled task is best effort: a task that already
//! woke up may still be waiting for the map lock.  The generation check makes
//! sure such a task never fires on behalf of an entry that replaced it.
//!
//! Timers live only in memory; dropping the last handle aborts every pending
//! task.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use armas_core::{MacAddress, ScheduleRecord, TimerMinutes};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

type ExpiryFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ExpiryCallback = Arc<dyn Fn(MacAddress) -> ExpiryFuture + Send + Sync>;

struct PendingTimer {
    minutes: TimerMinutes,
    expires_at: SystemTime,
    deadline: Instant,
    generation: u64,
    task: JoinHandle<()>,
}

impl PendingTimer {
    fn record(&self, mac: MacAddress, now: Instant) -> ScheduleRecord {
        ScheduleRecord {
            mac,
            minutes: self.minutes.get(),
            expires_at: unix_seconds(self.expires_at),
            remaining_seconds: self.deadline.saturating_duration_since(now).as_secs(),
        }
    }
}

struct Inner {
    pending: Mutex<HashMap<MacAddress, PendingTimer>>,
    next_generation: AtomicU64,
    on_expire: ExpiryCallback,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<MacAddress, PendingTimer>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(&self, mac: MacAddress, generation: u64) {
        let claimed = {
            let mut pending = self.pending();
            match pending.get(&mac) {
                Some(timer) if timer.generation == generation => {
                    pending.remove(&mac);
                    true
                }
                _ => false,
            }
        };

        if claimed {
            info!("timer for {mac} expired");
            (self.on_expire)(mac).await;
        } else {
            debug!("stale timer task for {mac} (generation {generation}) ignored");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in pending.drain() {
            timer.task.abort();
        }
    }
}

/// Pending timed blocks keyed by device.  Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl TimerRegistry {
    /// Creates an empty registry that runs `on_expire` for each timer that
    /// reaches its deadline.
    ///
    /// Must be called from within a Tokio runtime once timers are set.
    pub fn new<F, Fut>(on_expire: F) -> Self
    where
        F: Fn(MacAddress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let on_expire: ExpiryCallback =
            Arc::new(move |mac: MacAddress| -> ExpiryFuture { Box::pin(on_expire(mac)) });
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                on_expire,
            }),
        }
    }

    /// Schedules `mac` to be blocked after `minutes`, replacing any pending
    /// timer for the same device.
    pub fn set(&self, mac: MacAddress, minutes: TimerMinutes) -> ScheduleRecord {
        let now = Instant::now();
        let deadline = now + minutes.as_duration();
        let expires_at = SystemTime::now() + minutes.as_duration();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.inner.pending();

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(mac, generation).await;
            }
        });

        let timer = PendingTimer {
            minutes,
            expires_at,
            deadline,
            generation,
            task,
        };
        let record = timer.record(mac, now);

        if let Some(previous) = pending.insert(mac, timer) {
            previous.task.abort();
            info!("timer for {mac} replaced: block in {} min", minutes.get());
        } else {
            info!("timer for {mac} set: block in {} min", minutes.get());
        }
        record
    }

    /// Cancels the pending timer for `mac`.  Returns whether one existed.
    pub fn cancel(&self, mac: MacAddress) -> bool {
        let removed = self.inner.pending().remove(&mac);
        match removed {
            Some(timer) => {
                timer.task.abort();
                info!("timer for {mac} cancelled");
                true
            }
            None => false,
        }
    }

    /// The pending timer for `mac`, with remaining time computed now.
    pub fn get(&self, mac: MacAddress) -> Option<ScheduleRecord> {
        let now = Instant::now();
        self.inner.pending().get(&mac).map(|t| t.record(mac, now))
    }

    /// Every pending timer, ordered by device address.
    pub fn list_all(&self) -> Vec<ScheduleRecord> {
        let now = Instant::now();
        let mut records: Vec<_> = self
            .inner
            .pending()
            .iter()
            .map(|(mac, t)| t.record(*mac, now))
            .collect();
        records.sort_by_key(|r| r.mac);
        records
    }

    /// Cancels every pending timer.  Returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.pending().drain().collect();
        for (_, timer) in &drained {
            timer.task.abort();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.inner.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn minutes(n: i64) -> TimerMinutes {
        TimerMinutes::new(n).unwrap()
    }

    /// Registry whose expiry callback records the devices it was called for.
    fn recording_registry() -> (TimerRegistry, Arc<Mutex<Vec<MacAddress>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let registry = TimerRegistry::new(move |mac| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(mac);
            }
        });
        (registry, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_returns_full_remaining_time() {
        let (registry, _fired) = recording_registry();

        let record = registry.set(mac("AA:BB:CC:DD:EE:FF"), minutes(10));

        assert_eq!(record.minutes, 10);
        assert_eq!(record.remaining_seconds, 600);
        assert!(record.expires_at > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_at_deadline() {
        // Arrange
        let (registry, fired) = recording_registry();
        let m = mac("AA:BB:CC:DD:EE:FF");
        registry.set(m, minutes(1));

        // Act / Assert: not before the deadline...
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(fired.lock().unwrap().is_empty());

        // ...and exactly once after it.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![m]);
        assert!(registry.get(m).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_reports_elapsed_time() {
        let (registry, _fired) = recording_registry();
        let m = mac("AA:BB:CC:DD:EE:FF");
        registry.set(m, minutes(5));

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(registry.get(m).unwrap().remaining_seconds, 240);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_timer_discards_previous_deadline() {
        // Arrange
        let (registry, fired) = recording_registry();
        let m = mac("AA:BB:CC:DD:EE:FF");
        registry.set(m, minutes(1));

        // Act
        let record = registry.set(m, minutes(10));

        // Assert: only one pending entry, reporting the new duration.
        assert_eq!(record.minutes, 10);
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(fired.lock().unwrap().is_empty(), "old deadline must not fire");

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (registry, fired) = recording_registry();
        let m = mac("AA:BB:CC:DD:EE:FF");
        registry.set(m, minutes(1));

        assert!(registry.cancel(m));
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(fired.lock().unwrap().is_empty());
        assert!(!registry.cancel(m), "second cancel finds nothing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_all_is_sorted_and_complete() {
        let (registry, _fired) = recording_registry();
        let b = mac("BB:00:00:00:00:00");
        let a = mac("AA:00:00:00:00:00");
        registry.set(b, minutes(2));
        registry.set(a, minutes(3));

        let all = registry.list_all();

        assert_eq!(all.iter().map(|r| r.mac).collect::<Vec<_>>(), vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_drops_every_timer() {
        let (registry, fired) = recording_registry();
        registry.set(mac("AA:00:00:00:00:00"), minutes(1));
        registry.set(mac("BB:00:00:00:00:00"), minutes(1));

        assert_eq!(registry.cancel_all(), 2);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(fired.lock().unwrap().is_empty());
        assert!(registry.list_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registry_aborts_pending_timers() {
        let (registry, fired) = recording_registry();
        registry.set(mac("AA:BB:CC:DD:EE:FF"), minutes(1));

        drop(registry);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_for_different_devices_are_independent() {
        let (registry, fired) = recording_registry();
        let a = mac("AA:00:00:00:00:00");
        let b = mac("BB:00:00:00:00:00");
        registry.set(a, minutes(1));
        registry.set(b, minutes(5));

        registry.cancel(b);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(*fired.lock().unwrap(), vec![a]);
    }
}
