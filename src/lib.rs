//! # POSIX Message Queue Library
//!
//! A safe handle over the POSIX message-queue system calls (`mq_open`,
//! `mq_send`/`mq_timedsend`, `mq_receive`/`mq_timedreceive`, `mq_notify`,
//! `mq_getattr`/`mq_setattr`, `mq_close`, `mq_unlink`).
//!
//! Queuing, priority ordering and persistence are provided by the kernel. This
//! crate turns the raw descriptor into an owned handle with a reusable receive
//! buffer, a structured error taxonomy and a well-defined close/unlink
//! lifecycle.
//!
//! ## Architecture Overview
//!
//! - `queue`: the `MessageQueue` handle and its receive operations
//! - `buffer`: the fixed-capacity receive buffer owned by each handle
//! - `attr`: creation attributes, runtime status and system limits
//! - `error`: errno translation into `ErrorKind`
//! - `config`: open options as independent booleans, serde-loadable
//! - `async_queue`: tokio adapter running calls on the blocking pool
//! - `utils`: name validation, deadline conversion and formatting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use posix_mq::{MessageQueue, QueueAttributes};
//! use nix::mqueue::MQ_OFlag;
//! use nix::sys::stat::Mode;
//!
//! fn main() -> posix_mq::Result<()> {
//!     let attrs = QueueAttributes::new(10, 1024);
//!     let mut mq = MessageQueue::open(
//!         "/example",
//!         MQ_OFlag::O_RDWR | MQ_OFlag::O_CREAT,
//!         Mode::S_IRUSR | Mode::S_IWUSR,
//!         Some(&attrs),
//!     )?;
//!
//!     mq.send(b"hello", 1)?;
//!     let message = mq.receive()?;
//!     assert_eq!(message.payload, b"hello");
//!
//!     mq.unlink()
//! }
//! ```
//!
//! ## Concurrency
//!
//! `send` takes `&self`; every receive takes `&mut self` because it reuses the
//! handle's buffer in place, so concurrent receives on one handle have to be
//! serialized by the caller (for example with a mutex). Independent handles on
//! the same queue name can be used from different threads freely.

/// Creation attributes, runtime status and system-wide limits
pub mod attr;

/// Tokio adapter for using a handle from async code
///
/// Each call runs on the blocking pool with the handle moved into the task and
/// back, mirroring how blocking descriptors are driven from async transports.
pub mod async_queue;

pub mod buffer;

/// Command-line interface for the `pmq` binary
pub mod cli;

/// Open options expressed as independent booleans
pub mod config;

/// Error taxonomy and errno translation
pub mod error;

/// Terminal and file log formatting for the `pmq` binary
pub mod logging;

/// The message queue handle
///
/// Owns one descriptor plus its receive buffer and exposes
/// open/send/receive/notify/close/unlink as one lifecycle.
pub mod queue;

mod sys;

pub mod utils;

pub use async_queue::AsyncMessageQueue;
pub use attr::{QueueAttributes, QueueStatus, SystemLimits, MQ_PRIO_MAX, MSGSIZE_MAX};
pub use buffer::ReceiveBuffer;
pub use config::{Access, QueueConfig};
pub use error::{ErrorKind, MqError, Operation, Result};
pub use queue::{remove_queue, unlink_queue, Message, MessageQueue, MessageView};

/// Re-exported so callers can build flag sets and modes without naming nix.
pub use nix::mqueue::MQ_OFlag;
pub use nix::sys::signal::Signal;
pub use nix::sys::stat::Mode;

/// The current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Permission bits for newly created queues (owner read/write).
    pub const PERMISSIONS: u32 = 0o600;

    /// Queue depth used by `pmq` when creating without explicit attributes.
    ///
    /// Matches the stock `/proc/sys/fs/mqueue/msg_default`.
    pub const MAX_MESSAGES: usize = 10;

    /// Message size used by `pmq` when creating without explicit attributes.
    ///
    /// Matches the stock `/proc/sys/fs/mqueue/msgsize_default`.
    pub const MAX_MESSAGE_SIZE: usize = 8192;

    /// Longest single wait in `pmq recv` before it checks for Ctrl-C.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
}
