//! In-memory packet filter.
//!
//! Models a single chain as an ordered list of deny rules, head first, the
//! same way `iptables -I` / `-D` / `-L` behave for the rules this server
//! manages.  Failures can be switched on per primitive so callers can see
//! how the access-control layer reacts to a misbehaving filter.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use armas_core::MacAddress;
use async_trait::async_trait;

use crate::application::policy_store::{FilterError, PacketFilter};

#[derive(Default)]
struct Chain {
    rules: Vec<MacAddress>,
    /// Addresses whose rule is put straight back after every removal.
    sticky: HashSet<MacAddress>,
    fail_inserts: bool,
    fail_removals: bool,
    fail_listing: bool,
    insert_calls: u32,
    removal_calls: u32,
}

/// A [`PacketFilter`] that never leaves the process.
#[derive(Default)]
pub struct InMemoryFilter {
    chain: Mutex<Chain>,
}

impl InMemoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `rules` already on the chain, head first.
    pub fn with_rules(rules: Vec<MacAddress>) -> Self {
        Self {
            chain: Mutex::new(Chain {
                rules,
                ..Chain::default()
            }),
        }
    }

    /// Current rules, head first.
    pub fn rules(&self) -> Vec<MacAddress> {
        self.chain().rules.clone()
    }

    pub fn insert_calls(&self) -> u32 {
        self.chain().insert_calls
    }

    pub fn removal_calls(&self) -> u32 {
        self.chain().removal_calls
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.chain().fail_inserts = fail;
    }

    pub fn set_fail_removals(&self, fail: bool) {
        self.chain().fail_removals = fail;
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.chain().fail_listing = fail;
    }

    /// Simulates another tool re-adding the rule for `mac` every time it is
    /// removed.
    pub fn make_sticky(&self, mac: MacAddress) {
        self.chain().sticky.insert(mac);
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected(command: String) -> FilterError {
    FilterError::CommandFailed {
        command,
        status: 1,
        stderr: "injected failure".to_string(),
    }
}

#[async_trait]
impl PacketFilter for InMemoryFilter {
    async fn insert_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError> {
        let mut chain = self.chain();
        chain.insert_calls += 1;
        if chain.fail_inserts {
            return Err(injected(format!("insert {mac}")));
        }
        chain.rules.insert(0, mac);
        Ok(())
    }

    async fn remove_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError> {
        let mut chain = self.chain();
        chain.removal_calls += 1;
        if chain.fail_removals {
            return Err(injected(format!("remove {mac}")));
        }
        let Some(index) = chain.rules.iter().position(|r| *r == mac) else {
            return Err(FilterError::CommandFailed {
                command: format!("remove {mac}"),
                status: 1,
                stderr: "Bad rule (does a matching rule exist in that chain?)".to_string(),
            });
        };
        if !chain.sticky.contains(&mac) {
            chain.rules.remove(index);
        }
        Ok(())
    }

    async fn list_deny_rules(&self) -> Result<Vec<MacAddress>, FilterError> {
        let chain = self.chain();
        if chain.fail_listing {
            return Err(injected("list".to_string()));
        }
        Ok(chain.rules.clone())
    }
}
