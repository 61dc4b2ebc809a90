use derive_more::From;

pub(crate) type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

// -- EventError

pub type EventResult<T> = std::result::Result<T, EventError>;

#[derive(From, Debug)]
pub enum EventError {
    /// The thread backing a detached wait could not be started.
    FailedStart(BoxedError),
}

impl From<std::io::Error> for EventError {
    fn from(value: std::io::Error) -> Self {
        Self::FailedStart(Box::new(value))
    }
}

impl core::error::Error for EventError {}

impl core::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailedStart(err) => write!(f, "EventError::FailedStart({err})"),
        }
    }
}

// -- WaitGroupError

pub type WaitGroupResult<T> = std::result::Result<T, WaitGroupError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitGroupError {
    /// A positive delta was added while a `wait()` was draining the group.
    AddAfterWait { delta: u64 },

    /// More completions were reported than were outstanding, only
    /// raised under [`super::UnderflowPolicy::Strict`].
    Underflow { count: u64, delta: u64 },
}

impl core::error::Error for WaitGroupError {}

impl core::fmt::Display for WaitGroupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddAfterWait { delta } => {
                write!(f, "WaitGroupError::AddAfterWait(delta={delta})")
            }
            Self::Underflow { count, delta } => {
                write!(f, "WaitGroupError::Underflow(count={count}, delta={delta})")
            }
        }
    }
}
