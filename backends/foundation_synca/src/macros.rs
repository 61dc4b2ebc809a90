// Logging macros that call tracing underneath, letting the log_* features
// compile levels out of the wait paths entirely.

macro_rules! info {
    ($($t:tt)*) => {
        if cfg!(feature="log_info") {
            tracing::info!($($t)*);
        }
    };
}

macro_rules! warn {
    ($($t:tt)*) => {
        if cfg!(feature="log_warnings") {
            tracing::warn!($($t)*);
        }
    };
}

macro_rules! debug {
    ($($t:tt)*) => {
        if cfg!(feature="log_debug") {
            tracing::debug!($($t)*);
        }
    };
}

macro_rules! error {
    ($($t:tt)*) => {
        if cfg!(feature="log_errors") {
            tracing::error!($($t)*);
        }
    };
}
