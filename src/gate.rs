//! Admission gate: per-caller cooldowns for expensive actions.
//! Entries live in a bounded LRU; idle callers age out instead of
//! accumulating one stamp per client address forever.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

/// The gated action kinds. Each kind carries its own cooldown (config) but
/// shares the same keyspace design: one stamp per (caller, action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateAction {
    OtpIssue,
    DescriptionGen,
}

impl GateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GateAction::OtpIssue => "otp_issue",
            GateAction::DescriptionGen => "description_gen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GateKey {
    identity: String,
    action: GateAction,
}

/// Outcome of an admission check. Denial is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Remaining wait for a denied call, zero when allowed.
    pub fn retry_after(&self) -> Duration {
        match self {
            Admission::Allowed => Duration::ZERO,
            Admission::Denied { retry_after } => *retry_after,
        }
    }
}

/// Cooldown gate shared by request handlers. Never blocks, never errors.
pub struct AdmissionGate {
    entries: Mutex<LruCache<GateKey, Instant>>,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("gate capacity must be > 0"),
            )),
        }
    }

    /// Check whether `identity` may perform `action` now. An allowed call
    /// stamps the entry; a denied call leaves the original window untouched.
    pub fn check_and_record(
        &self,
        identity: &str,
        action: GateAction,
        min_interval: Duration,
    ) -> Admission {
        self.check_at(identity, action, min_interval, Instant::now())
    }

    fn check_at(
        &self,
        identity: &str,
        action: GateAction,
        min_interval: Duration,
        now: Instant,
    ) -> Admission {
        let key = GateKey {
            identity: identity.to_string(),
            action,
        };
        let mut entries = self.entries.lock();
        if let Some(&last_allowed) = entries.get(&key) {
            let elapsed = now.duration_since(last_allowed);
            if elapsed < min_interval {
                let retry_after = min_interval - elapsed;
                debug!(
                    identity,
                    action = action.as_str(),
                    retry_after_secs = retry_after.as_secs(),
                    "admission denied"
                );
                return Admission::Denied { retry_after };
            }
        }
        entries.put(key, now);
        Admission::Allowed
    }

    /// Number of live entries (bounded by capacity).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_window_allows_denies_and_resets() {
        let gate = AdmissionGate::new(16);
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(30);

        assert_eq!(
            gate.check_at("1.2.3.4", GateAction::OtpIssue, cooldown, t0),
            Admission::Allowed
        );

        let at_10 = gate.check_at(
            "1.2.3.4",
            GateAction::OtpIssue,
            cooldown,
            t0 + Duration::from_secs(10),
        );
        assert!(!at_10.is_allowed());
        assert_eq!(at_10.retry_after(), Duration::from_secs(20));

        assert_eq!(
            gate.check_at(
                "1.2.3.4",
                GateAction::OtpIssue,
                cooldown,
                t0 + Duration::from_secs(31),
            ),
            Admission::Allowed
        );
    }

    #[test]
    fn denied_attempt_preserves_original_window() {
        let gate = AdmissionGate::new(16);
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(30);

        gate.check_at("caller", GateAction::OtpIssue, cooldown, t0);
        // Hammering during the window must not extend it.
        for secs in [5u64, 10, 15, 20, 25] {
            let result = gate.check_at(
                "caller",
                GateAction::OtpIssue,
                cooldown,
                t0 + Duration::from_secs(secs),
            );
            assert!(!result.is_allowed());
        }
        assert!(gate
            .check_at(
                "caller",
                GateAction::OtpIssue,
                cooldown,
                t0 + Duration::from_secs(30),
            )
            .is_allowed());
    }

    #[test]
    fn action_kinds_are_independent() {
        let gate = AdmissionGate::new(16);
        let t0 = Instant::now();

        gate.check_at("caller", GateAction::OtpIssue, Duration::from_secs(30), t0);
        // The OTP stamp must not throttle generation requests.
        assert!(gate
            .check_at(
                "caller",
                GateAction::DescriptionGen,
                Duration::from_secs(10),
                t0 + Duration::from_secs(1),
            )
            .is_allowed());
    }

    #[test]
    fn capacity_evicts_least_recent_caller() {
        let gate = AdmissionGate::new(2);
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(30);

        gate.check_at("a", GateAction::OtpIssue, cooldown, t0);
        gate.check_at("b", GateAction::OtpIssue, cooldown, t0);
        gate.check_at("c", GateAction::OtpIssue, cooldown, t0);
        assert_eq!(gate.len(), 2);

        // "a" was evicted, so it is admitted again inside its old window.
        assert!(gate
            .check_at("a", GateAction::OtpIssue, cooldown, t0 + Duration::from_secs(1))
            .is_allowed());
        // "c" is still present and still throttled.
        assert!(!gate
            .check_at("c", GateAction::OtpIssue, cooldown, t0 + Duration::from_secs(1))
            .is_allowed());
    }
}
