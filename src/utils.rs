//! # Utility Functions and Helper Module
//!
//! Helpers shared by the queue handle, the async adapter and the `pmq` binary.
//!
//! ## Key Functionality Categories
//!
//! - **Validation**: queue names are checked before they reach `mq_open`
//! - **Deadlines**: conversion of `SystemTime` deadlines to kernel timespecs
//! - **Naming**: collision-free queue names for tests and scratch queues
//! - **Formatting**: human-readable byte counts for status output
//!
//! ## Usage Examples
//!
//! ```rust
//! use posix_mq::utils::*;
//!
//! validate_queue_name("/orders").unwrap();
//! assert!(validate_queue_name("orders").is_err());
//!
//! let name = unique_queue_name("scratch");
//! assert!(name.starts_with("/scratch_"));
//!
//! assert_eq!(format_bytes(8192), "8.00 KB");
//! ```

use crate::error::{MqError, Result};
use nix::sys::time::TimeSpec;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Longest name component the kernel accepts after the leading slash.
pub const NAME_MAX: usize = 255;

/// Validate a message queue name
///
/// Linux requires queue names of the form `/somename`: a single leading
/// slash followed by one or more characters, none of which are slashes.
/// Checking here turns what would be an opaque `EINVAL`/`EACCES` from the
/// kernel into an error that names the offending rule.
///
/// ## Validation Rules
///
/// - Must start with `/`
/// - Must contain at least one character after the slash
/// - Must not contain another `/`
/// - Must not contain NUL bytes
/// - Must not exceed `NAME_MAX` bytes after the slash
///
/// ## Returns
/// - `Ok(())`: name is acceptable
/// - `Err(MqError::InvalidName)`: the first rule that failed
pub fn validate_queue_name(name: &str) -> Result<()> {
    let invalid = |reason| MqError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let rest = name
        .strip_prefix('/')
        .ok_or_else(|| invalid("must start with '/'"))?;
    if rest.is_empty() {
        return Err(invalid("must have at least one character after '/'"));
    }
    if rest.contains('/') {
        return Err(invalid("must not contain '/' after the first character"));
    }
    if rest.contains('\0') {
        return Err(invalid("must not contain NUL bytes"));
    }
    if rest.len() > NAME_MAX {
        return Err(invalid("longer than NAME_MAX"));
    }
    Ok(())
}

/// Convert an absolute deadline into the `CLOCK_REALTIME` timespec the timed
/// calls expect. Deadlines before the Unix epoch cannot be represented.
pub fn deadline_to_timespec(deadline: SystemTime) -> Result<TimeSpec> {
    let since_epoch = deadline
        .duration_since(UNIX_EPOCH)
        .map_err(|_| MqError::InvalidDeadline("before the Unix epoch"))?;
    let seconds = libc::time_t::try_from(since_epoch.as_secs())
        .map_err(|_| MqError::InvalidDeadline("too far in the future"))?;
    Ok(TimeSpec::new(seconds, since_epoch.subsec_nanos() as _))
}

/// Absolute deadline `timeout` from now. Fails when the sum does not fit in
/// a `SystemTime`.
pub fn deadline_after(timeout: Duration) -> Result<SystemTime> {
    SystemTime::now()
        .checked_add(timeout)
        .ok_or(MqError::InvalidDeadline("too far in the future"))
}

/// Generate a unique queue name
///
/// Creates `/<prefix>_<uuid>` so concurrent tests and tools never collide on
/// the same kernel object.
///
/// ## Thread Safety
///
/// This function is thread-safe and can be called concurrently from multiple threads.
pub fn unique_queue_name(prefix: &str) -> String {
    format!("/{}_{}", prefix, Uuid::new_v4().simple())
}

/// Format bytes in a human-readable way
///
/// ## Examples
///
/// ```rust
/// # use posix_mq::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// assert_eq!(format_bytes(16 * 1024 * 1024), "16.00 MB");
/// ```
pub fn format_bytes(bytes: usize) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
