//! AccessPolicyStore: the authoritative per-device block list.
//!
//! A device is blocked if and only if the packet filter currently holds a
//! deny rule for its hardware address.  There is no cached boolean: the
//! filter can be changed out-of-band (an administrator, a reboot, another
//! tool), so every read goes back to it.
//!
//! # Rule lifecycle
//!
//! ```text
//! block(mac)    ── already listed? ──yes──► Ok (idempotent)
//!                        │no
//!                        ▼
//!               insert deny rule at head of chain
//!
//! unblock(mac)  ── loop: listed? ──no──► Ok
//!                        │yes
//!                        ▼
//!               remove one deny rule   (duplicates may have accumulated)
//!                        │
//!               failure ─┴─► re-check once, then UnblockFailed
//!               cap hit ───► UnblockRetriesExhausted
//! ```
//!
//! The store itself does not serialize concurrent calls; the
//! [`AccessController`](super::access_control::AccessController) holds a
//! per-device lock around every mutation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use armas_core::{AccessError, MacAddress};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default cap on deny-rule removals performed by a single `unblock`.
pub const DEFAULT_MAX_UNBLOCK_ATTEMPTS: u32 = 32;

/// Failures of the privileged packet-filter mechanism.
///
/// Any call may fail for permission or tooling-availability reasons.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter tool could not be started at all.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The filter tool ran but reported failure.
    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// The filter tool did not finish in time and was killed.
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// The three primitives the access-control core needs from the host's packet
/// filter.
///
/// No transactional guarantee exists between calls.  The production
/// implementation shells out to `iptables`; tests and `--dry-run` use
/// [`InMemoryFilter`](crate::infrastructure::packet_filter::InMemoryFilter).
#[async_trait]
pub trait PacketFilter: Send + Sync {
    /// Inserts a rule dropping forwarded traffic from `mac` at the head of the
    /// chain.
    async fn insert_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError>;

    /// Removes one rule dropping forwarded traffic from `mac`.
    async fn remove_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError>;

    /// Lists the address of every deny rule on the chain, one entry per rule.
    /// Duplicates are preserved.
    async fn list_deny_rules(&self) -> Result<Vec<MacAddress>, FilterError>;
}

/// Queries and mutates the block list through a [`PacketFilter`].
pub struct AccessPolicyStore {
    filter: Arc<dyn PacketFilter>,
    max_unblock_attempts: u32,
}

impl AccessPolicyStore {
    /// Creates a store over `filter` with the default unblock retry cap.
    pub fn new(filter: Arc<dyn PacketFilter>) -> Self {
        Self {
            filter,
            max_unblock_attempts: DEFAULT_MAX_UNBLOCK_ATTEMPTS,
        }
    }

    /// Overrides the number of removals a single `unblock` may perform.
    #[must_use]
    pub fn with_max_unblock_attempts(mut self, attempts: u32) -> Self {
        self.max_unblock_attempts = attempts.max(1);
        self
    }

    /// Normalizes case and separator, then checks the strict 6-octet pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidIdentifier`] for any other shape.
    pub fn validate_identifier(raw: &str) -> Result<MacAddress, AccessError> {
        MacAddress::parse(raw)
    }

    /// Returns whether a deny rule for `mac` currently exists.  Side-effect free.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::QueryFailed`] if the rules cannot be listed.
    pub async fn is_blocked(&self, mac: MacAddress) -> Result<bool, AccessError> {
        self.listed(mac)
            .await
            .map_err(|e| AccessError::QueryFailed(e.to_string()))
    }

    /// Blocks `mac`.  A no-op if it is already blocked.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::BlockFailed`] if the existing rules cannot be
    /// listed or the deny rule cannot be inserted.
    pub async fn block(&self, mac: MacAddress) -> Result<(), AccessError> {
        let block_failed = |e: FilterError| AccessError::BlockFailed {
            mac,
            reason: e.to_string(),
        };

        if self.listed(mac).await.map_err(block_failed)? {
            debug!("{mac} already blocked; nothing to insert");
            return Ok(());
        }

        match self.filter.insert_deny_rule(mac).await {
            Ok(()) => {
                info!("blocked {mac}");
                Ok(())
            }
            Err(e) => {
                warn!("inserting deny rule for {mac} failed: {e}");
                Err(block_failed(e))
            }
        }
    }

    /// Removes every deny rule for `mac`, including duplicates.
    ///
    /// If a removal call fails the loop stops, the rules are listed once more,
    /// and the call succeeds only if nothing is left.
    ///
    /// # Errors
    ///
    /// - [`AccessError::UnblockFailed`] if listing fails, or a removal fails
    ///   and rules remain.
    /// - [`AccessError::UnblockRetriesExhausted`] if rules are still listed
    ///   after the configured number of removals.
    pub async fn unblock(&self, mac: MacAddress) -> Result<(), AccessError> {
        let unblock_failed = |reason: String| AccessError::UnblockFailed { mac, reason };

        let mut removals = 0u32;
        loop {
            if !self
                .listed(mac)
                .await
                .map_err(|e| unblock_failed(e.to_string()))?
            {
                if removals > 0 {
                    info!("unblocked {mac} ({removals} rule(s) removed)");
                } else {
                    debug!("{mac} was not blocked");
                }
                return Ok(());
            }

            if removals == self.max_unblock_attempts {
                error!("{mac} still blocked after {removals} removals; rules keep reappearing");
                return Err(AccessError::UnblockRetriesExhausted {
                    mac,
                    attempts: removals,
                });
            }

            removals += 1;
            if let Err(e) = self.filter.remove_deny_rule(mac).await {
                warn!("removing deny rule for {mac} failed: {e}");
                // Someone else may have removed the last rule in the meantime.
                return match self.listed(mac).await {
                    Ok(false) => Ok(()),
                    Ok(true) => Err(unblock_failed(e.to_string())),
                    Err(list_err) => Err(unblock_failed(format!("{e}; {list_err}"))),
                };
            }
        }
    }

    /// Every blocked address, deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::QueryFailed`] if the rules cannot be listed.
    pub async fn list_blocked(&self) -> Result<BTreeSet<MacAddress>, AccessError> {
        let rules = self
            .filter
            .list_deny_rules()
            .await
            .map_err(|e| AccessError::QueryFailed(e.to_string()))?;
        Ok(rules.into_iter().collect())
    }

    async fn listed(&self, mac: MacAddress) -> Result<bool, FilterError> {
        Ok(self.filter.list_deny_rules().await?.contains(&mac))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
