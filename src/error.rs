//! # Error Translation
//!
//! Every failure the message-queue facility can report is funnelled through
//! [`MqError`]. Callers that only care about the broad category match on
//! [`MqError::kind`]; callers that need the raw code for diagnostics read
//! [`MqError::errno`].
//!
//! The same errno can mean different things depending on the call that
//! produced it. `EMSGSIZE` from `mq_send` means the payload is larger than the
//! queue's message size, while from `mq_receive` it means the receive buffer is
//! smaller than the queue's message size. The [`Operation`] carried by each
//! system error resolves that ambiguity.

use nix::errno::Errno;
use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MqError>;

/// The message-queue call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Send,
    Receive,
    Notify,
    GetAttr,
    SetAttr,
    Close,
    Unlink,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "mq_open",
            Operation::Send => "mq_send",
            Operation::Receive => "mq_receive",
            Operation::Notify => "mq_notify",
            Operation::GetAttr => "mq_getattr",
            Operation::SetAttr => "mq_setattr",
            Operation::Close => "mq_close",
            Operation::Unlink => "mq_unlink",
        };
        f.write_str(name)
    }
}

/// Broad failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open without create on a missing name, or unlink of a removed name.
    NotFound,
    /// Create + exclusive on a name that already exists.
    AlreadyExists,
    /// Malformed name, bad attribute values or an invalid deadline.
    InvalidArgument,
    /// Insufficient rights to open the queue in the requested mode.
    PermissionDenied,
    /// Open-file/queue limits reached, or the receive buffer could not be allocated.
    ResourceExhausted,
    /// Send payload larger than the queue's message size.
    MessageTooLarge,
    /// Receive buffer smaller than the queue's message size. Nothing was dequeued.
    BufferTooSmall,
    /// Nonblocking mode and the queue is full (send) or empty (receive).
    WouldBlock,
    /// A timed call reached its deadline.
    TimedOut,
    /// Interrupted by a signal handler; safe to retry.
    Interrupted,
    /// The handle was already closed.
    NotOpen,
    /// Anything outside the categories above, e.g. `EBADF` when receiving on a
    /// write-only handle.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::MessageTooLarge => "message too large",
            ErrorKind::BufferTooSmall => "buffer too small",
            ErrorKind::WouldBlock => "would block",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::NotOpen => "not open",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum MqError {
    /// The underlying system call failed.
    #[error("{op} failed: {errno}")]
    Sys { op: Operation, errno: Errno },

    /// Rejected before reaching the kernel.
    #[error("invalid queue name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid queue attributes: {0}")]
    InvalidAttributes(String),

    #[error("invalid deadline: {0}")]
    InvalidDeadline(&'static str),

    #[error("failed to allocate a {size}-byte receive buffer")]
    BufferAllocation { size: usize },

    #[error("message queue is not open")]
    NotOpen,

    /// A blocking call dispatched to the tokio blocking pool panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MqError {
    pub(crate) fn sys(op: Operation, errno: Errno) -> Self {
        MqError::Sys { op, errno }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MqError::Sys { op, errno } => classify(*op, *errno),
            MqError::InvalidName { .. }
            | MqError::InvalidAttributes(_)
            | MqError::InvalidDeadline(_) => ErrorKind::InvalidArgument,
            MqError::BufferAllocation { .. } => ErrorKind::ResourceExhausted,
            MqError::NotOpen => ErrorKind::NotOpen,
            MqError::Task(_) | MqError::Io { .. } => ErrorKind::Other,
        }
    }

    /// The original system error code, when the failure came from the kernel.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            MqError::Sys { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// True when repeating the same call may succeed without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
        )
    }
}

fn classify(op: Operation, errno: Errno) -> ErrorKind {
    match errno {
        Errno::ENOENT => ErrorKind::NotFound,
        Errno::EEXIST => ErrorKind::AlreadyExists,
        Errno::EINVAL | Errno::ENAMETOOLONG => ErrorKind::InvalidArgument,
        Errno::EACCES | Errno::EPERM => ErrorKind::PermissionDenied,
        Errno::EMFILE | Errno::ENFILE | Errno::ENOSPC | Errno::ENOMEM => {
            ErrorKind::ResourceExhausted
        }
        Errno::EMSGSIZE if op == Operation::Receive => ErrorKind::BufferTooSmall,
        Errno::EMSGSIZE => ErrorKind::MessageTooLarge,
        Errno::EAGAIN => ErrorKind::WouldBlock,
        Errno::ETIMEDOUT => ErrorKind::TimedOut,
        Errno::EINTR => ErrorKind::Interrupted,
        _ => ErrorKind::Other,
    }
}
