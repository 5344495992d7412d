//! Account lifecycle states.

use std::fmt;

/// Where the account is in its key lifecycle.
///
/// ```text
/// Anonymous -> Registering -> Authenticated
/// Anonymous -> LoggingIn -> [TwoFactorPending ->] Authenticated
/// Authenticated -> Locked -> Authenticated
/// Authenticated | Locked | TwoFactorPending -> Anonymous
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountState {
    /// No account loaded.
    #[default]
    Anonymous,
    /// Registration in progress.
    Registering,
    /// Password check in progress.
    LoggingIn,
    /// Password accepted; keys staged until the second factor confirms.
    TwoFactorPending,
    /// Keys loaded in the session store.
    Authenticated,
    /// Signed in but keys forgotten; needs the password again.
    Locked,
}

impl AccountState {
    /// Whether a login or registration is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(self, AccountState::Registering | AccountState::LoggingIn)
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountState::Anonymous => "anonymous",
            AccountState::Registering => "registering",
            AccountState::LoggingIn => "logging-in",
            AccountState::TwoFactorPending => "two-factor-pending",
            AccountState::Authenticated => "authenticated",
            AccountState::Locked => "locked",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_anonymous() {
        assert_eq!(AccountState::default(), AccountState::Anonymous);
    }

    #[test]
    fn test_transitional_states() {
        assert!(AccountState::Registering.is_transitional());
        assert!(AccountState::LoggingIn.is_transitional());
        assert!(!AccountState::TwoFactorPending.is_transitional());
        assert!(!AccountState::Anonymous.is_transitional());
    }

    #[test]
    fn test_display() {
        assert_eq!(AccountState::TwoFactorPending.to_string(), "two-factor-pending");
    }
}
