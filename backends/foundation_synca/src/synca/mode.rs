use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `WaitMode` selects how a wait operation on an [`super::Event`] runs.
///
/// There is no implicit timeout anywhere: a detached wait only gets a
/// deadline when one is given explicitly.
///
/// In configuration files the mode is tagged, e.g. in TOML:
///
/// ```toml
/// mode = "detached"
/// timeout_ms = 250
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WaitMode {
    /// Block the calling thread until the wait is satisfied.
    #[default]
    Blocking,

    /// Run the wait on its own thread and hand back a pending
    /// [`super::Completion`]. With a timeout the wait retires itself at
    /// the deadline instead of staying blocked.
    Detached {
        #[serde(
            default,
            rename = "timeout_ms",
            skip_serializing_if = "Option::is_none",
            with = "crate::extensions::serde_ext::optional_duration_millis"
        )]
        timeout: Option<Duration>,
    },
}

impl WaitMode {
    /// The timeout older callers relied on when asking for a detached
    /// wait without naming one. Never applied unless passed explicitly.
    pub const LEGACY_DETACHED_TIMEOUT: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn blocking() -> Self {
        Self::Blocking
    }

    /// A detached wait without a deadline.
    #[must_use]
    pub fn detached() -> Self {
        Self::Detached { timeout: None }
    }

    #[must_use]
    pub fn detached_with_timeout(timeout: Duration) -> Self {
        Self::Detached {
            timeout: Some(timeout),
        }
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Blocking => None,
            Self::Detached { timeout } => *timeout,
        }
    }
}
