//! Watch errors

/// Watch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// Watcher limit reached
    #[error("too many watchers (max: {0})")]
    TooManyWatchers(usize),
}
