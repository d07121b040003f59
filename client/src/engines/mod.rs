//! The wallet engines. Each one owns its transaction state behind a lock,
//! checks its in-flight guard synchronously before any await, and touches the
//! shared wallet only through [`crate::WalletStore`] commit/rollback paths.

pub mod achievements;
pub mod daily;
pub mod exchange;
pub mod spin;

/// Shared user-facing copy for failures that are not engine-specific.
pub(crate) const MSG_SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub(crate) const MSG_OFFLINE: &str = "Connection lost. Check your network and try again.";
