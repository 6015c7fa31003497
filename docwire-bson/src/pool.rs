//! String interning pool.
//!
//! Repeated short strings (field names above all) are deduplicated through a
//! concurrent table of weak references. A pooled string lives only as long as
//! some decoded document holds it; dead entries are purged periodically.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Keys up to this many bytes are offered to the pool as likely cacheable.
pub const LIKELY_KEY_MAX_LEN: usize = 32;

/// Default number of insertions between opportunistic purges.
pub const DEFAULT_PURGE_INTERVAL: usize = 4096;

/// Decides whether a string is worth interning.
pub trait PoolPolicy: Send + Sync + fmt::Debug {
    /// `likely_cacheable` is the decoder's hint (set for short keys).
    fn should_intern(&self, likely_cacheable: bool, bytes: &[u8]) -> bool;
}

/// Interns every string.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPolicy;

impl PoolPolicy for AlwaysPolicy {
    fn should_intern(&self, _likely_cacheable: bool, _bytes: &[u8]) -> bool {
        true
    }
}

/// Interns only strings the decoder flagged as likely to repeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyLikelyPolicy;

impl PoolPolicy for OnlyLikelyPolicy {
    fn should_intern(&self, likely_cacheable: bool, _bytes: &[u8]) -> bool {
        likely_cacheable
    }
}

/// Never interns.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPolicy;

impl PoolPolicy for NeverPolicy {
    fn should_intern(&self, _likely_cacheable: bool, _bytes: &[u8]) -> bool {
        false
    }
}

/// Configurable policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPolicyKind {
    Always,
    #[default]
    OnlyLikely,
    Never,
}

impl PoolPolicyKind {
    pub fn policy(self) -> Arc<dyn PoolPolicy> {
        match self {
            PoolPolicyKind::Always => Arc::new(AlwaysPolicy),
            PoolPolicyKind::OnlyLikely => Arc::new(OnlyLikelyPolicy),
            PoolPolicyKind::Never => Arc::new(NeverPolicy),
        }
    }
}

impl FromStr for PoolPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(PoolPolicyKind::Always),
            "only_likely" => Ok(PoolPolicyKind::OnlyLikely),
            "never" => Ok(PoolPolicyKind::Never),
            other => Err(format!("unknown string pool policy: {}", other)),
        }
    }
}

impl fmt::Display for PoolPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolPolicyKind::Always => "always",
            PoolPolicyKind::OnlyLikely => "only_likely",
            PoolPolicyKind::Never => "never",
        })
    }
}

/// Weak deduplication table for strings.
#[derive(Debug)]
pub struct StringPool {
    entries: DashMap<Box<str>, Weak<str>>,
    policy: Arc<dyn PoolPolicy>,
    inserts: AtomicUsize,
    purge_interval: usize,
}

impl StringPool {
    pub fn new(policy: Arc<dyn PoolPolicy>) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            inserts: AtomicUsize::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    pub fn with_kind(kind: PoolPolicyKind) -> Self {
        Self::new(kind.policy())
    }

    /// Sets the number of insertions between opportunistic purges.
    pub fn with_purge_interval(mut self, interval: usize) -> Self {
        self.purge_interval = interval.max(1);
        self
    }

    pub fn policy(&self) -> &Arc<dyn PoolPolicy> {
        &self.policy
    }

    /// Returns a string for `s`, pooled if the policy agrees.
    pub fn fetch(&self, likely_cacheable: bool, s: &str) -> Arc<str> {
        if self.policy.should_intern(likely_cacheable, s.as_bytes()) {
            self.intern(s)
        } else {
            Arc::from(s)
        }
    }

    /// Returns the canonical shared instance of `s`.
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(live) = self.entries.get(s).and_then(|w| w.upgrade()) {
            return live;
        }

        let interned = {
            match self.entries.entry(Box::from(s)) {
                Entry::Occupied(mut slot) => match slot.get().upgrade() {
                    Some(live) => return live,
                    None => {
                        let fresh: Arc<str> = Arc::from(s);
                        slot.insert(Arc::downgrade(&fresh));
                        fresh
                    }
                },
                Entry::Vacant(slot) => {
                    let fresh: Arc<str> = Arc::from(s);
                    slot.insert(Arc::downgrade(&fresh));
                    fresh
                }
            }
        };

        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.purge_interval == 0 {
            self.purge();
        }
        interned
    }

    /// Removes entries whose strings are no longer referenced.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Purged string pool");
        }
        removed
    }

    /// Number of entries, including dead ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::with_kind(PoolPolicyKind::default())
    }
}
