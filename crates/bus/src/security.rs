//! Advisory security policy.
//!
//! The hook cannot block delivery; whether a violating envelope is still
//! processed is decided by [`ViolationPolicy`]. The permissive default
//! matches the posture of the rest of the bus: degrade and report rather
//! than hard-fail on input from an untrusted party.

use std::sync::Arc;

use log::warn;

/// Classification handed to the security policy hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityAlert {
    /// A peer never became ready within the handshake retry budget.
    HandshakeTimeout,
    /// A context claimed another context's identity.
    ForgedMessage,
    /// An envelope's auth token did not match the stored token.
    TokenMismatch,
}

impl SecurityAlert {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityAlert::HandshakeTimeout => "handshake-timeout",
            SecurityAlert::ForgedMessage => "forged-message",
            SecurityAlert::TokenMismatch => "token-mismatch",
        }
    }
}

/// What to do with an envelope that failed a security check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Raise the alert and keep processing the envelope.
    #[default]
    Alert,
    /// Raise the alert and drop the envelope.
    AlertAndDrop,
}

/// Handler invoked with (peer id, classification) on every violation.
pub type SecurityHook = Arc<dyn Fn(&str, SecurityAlert) + Send + Sync>;

pub(crate) struct SecurityPolicy {
    pub hook: Option<SecurityHook>,
    pub violation: ViolationPolicy,
}

impl SecurityPolicy {
    /// Logs and forwards one alert. Absence of a hook is a no-op.
    pub fn raise(&self, peer: &str, alert: SecurityAlert) {
        warn!("security alert for {peer}: {}", alert.as_str());
        if let Some(hook) = &self.hook {
            hook(peer, alert);
        }
    }

    /// Whether envelope-level violations suppress further processing.
    pub fn drops_violations(&self) -> bool {
        self.violation == ViolationPolicy::AlertAndDrop
    }
}
