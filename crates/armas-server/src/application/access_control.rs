//! AccessController: the single entry point for access-control operations.
//!
//! The controller owns an [`AccessPolicyStore`] and a [`TimerRegistry`] and
//! keeps them consistent:
//!
//! - A manual block or unblock cancels any pending timer for the device first,
//!   so a stale timer can never re-block a device the operator just unblocked.
//! - The timer expiry callback performs the actual block through the same
//!   store.
//! - Every mutation for one device (manual or timer-driven) runs under that
//!   device's entry in a [`KeyedLocks`] map, so two unblock loops for the same
//!   device never interleave.  Different devices never wait for each other.
//!
//! All operations accept the identifier as the operator typed it and validate
//! it before anything else happens.
//!
//! ## Races that are accepted
//!
//! A timer that has already reached its deadline claims its entry before it
//! waits for the device lock.  If a manual unblock holds the lock at that
//! moment, its `cancel` finds nothing and the block lands afterwards.  The
//! device ends up blocked, which is what the expired timer asked for.

use std::collections::BTreeSet;
use std::sync::Arc;

use armas_core::{AccessError, MacAddress, ScheduleRecord, TimerMinutes};
use serde::Serialize;
use tracing::{debug, error, info};

use super::keyed_lock::KeyedLocks;
use super::policy_store::AccessPolicyStore;
use super::timer_registry::TimerRegistry;

/// The block state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockStatus {
    pub mac: MacAddress,
    pub blocked: bool,
}

/// The outcome of a timer cancellation.  `cancelled` is `false` when no timer
/// was pending, which is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerCancellation {
    pub mac: MacAddress,
    pub cancelled: bool,
}

pub struct AccessController {
    store: Arc<AccessPolicyStore>,
    timers: TimerRegistry,
    locks: Arc<KeyedLocks<MacAddress>>,
}

impl AccessController {
    /// Wires a controller around `store`, binding the timer expiry callback to
    /// `store.block`.
    pub fn new(store: AccessPolicyStore) -> Self {
        let store = Arc::new(store);
        let locks = Arc::new(KeyedLocks::new());

        let timers = {
            let store = Arc::clone(&store);
            let locks = Arc::clone(&locks);
            TimerRegistry::new(move |mac| {
                let store = Arc::clone(&store);
                let locks = Arc::clone(&locks);
                async move {
                    let _guard = locks.lock(&mac).await;
                    match store.block(mac).await {
                        Ok(()) => info!("scheduled block of {mac} applied"),
                        Err(e) => error!("scheduled block of {mac} failed: {e}"),
                    }
                }
            })
        };

        Self {
            store,
            timers,
            locks,
        }
    }

    /// Blocks a device now, superseding any pending timer for it.
    ///
    /// # Errors
    ///
    /// Validation errors, or [`AccessError::BlockFailed`].
    pub async fn block_now(&self, raw: &str) -> Result<BlockStatus, AccessError> {
        let mac = identify(raw)?;
        let _guard = self.locks.lock(&mac).await;

        if self.timers.cancel(mac) {
            debug!("manual block of {mac} supersedes its pending timer");
        }
        self.store.block(mac).await?;
        Ok(BlockStatus { mac, blocked: true })
    }

    /// Unblocks a device now and drops any pending timer for it.
    ///
    /// # Errors
    ///
    /// Validation errors, [`AccessError::UnblockFailed`] or
    /// [`AccessError::UnblockRetriesExhausted`].
    pub async fn unblock_now(&self, raw: &str) -> Result<BlockStatus, AccessError> {
        let mac = identify(raw)?;
        let _guard = self.locks.lock(&mac).await;

        if self.timers.cancel(mac) {
            debug!("manual unblock of {mac} dropped its pending timer");
        }
        self.store.unblock(mac).await?;
        Ok(BlockStatus {
            mac,
            blocked: false,
        })
    }

    /// Schedules a block after `minutes`.  The device is not touched until the
    /// timer fires.  Fractional minutes are truncated, with a floor of one
    /// minute for positive values.
    ///
    /// # Errors
    ///
    /// Validation errors for the identifier, then
    /// [`AccessError::InvalidDuration`] for a duration that is not a positive
    /// finite number.
    pub async fn schedule_block(
        &self,
        raw: &str,
        minutes: f64,
    ) -> Result<ScheduleRecord, AccessError> {
        let mac = identify(raw)?;
        let minutes = TimerMinutes::from_fractional(minutes)?;
        let _guard = self.locks.lock(&mac).await;
        Ok(self.timers.set(mac, minutes))
    }

    /// Whether the device is blocked right now, read from the packet filter.
    pub async fn query_blocked(&self, raw: &str) -> Result<BlockStatus, AccessError> {
        let mac = identify(raw)?;
        let blocked = self.store.is_blocked(mac).await?;
        Ok(BlockStatus { mac, blocked })
    }

    /// The pending timer for the device, if any.
    pub fn query_timer(&self, raw: &str) -> Result<Option<ScheduleRecord>, AccessError> {
        let mac = identify(raw)?;
        Ok(self.timers.get(mac))
    }

    pub fn cancel_timer(&self, raw: &str) -> Result<TimerCancellation, AccessError> {
        let mac = identify(raw)?;
        let cancelled = self.timers.cancel(mac);
        Ok(TimerCancellation { mac, cancelled })
    }

    pub async fn list_blocked(&self) -> Result<BTreeSet<MacAddress>, AccessError> {
        self.store.list_blocked().await
    }

    pub fn list_timers(&self) -> Vec<ScheduleRecord> {
        self.timers.list_all()
    }

    /// Drops every pending timer.  Timers are not persisted, so this is what
    /// happens to them on process exit anyway.
    pub fn shutdown(&self) -> usize {
        let dropped = self.timers.cancel_all();
        if dropped > 0 {
            info!("dropped {dropped} pending timer(s) on shutdown");
        }
        dropped
    }
}

/// Rejects empty input as missing before checking the address format.
fn identify(raw: &str) -> Result<MacAddress, AccessError> {
    if raw.trim().is_empty() {
        return Err(AccessError::MissingIdentifier);
    }
    AccessPolicyStore::validate_identifier(raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
