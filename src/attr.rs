//! Queue attributes: what is requested at creation time, what the kernel
//! reports back for an open queue, and the system-wide ceilings.

use crate::error::{MqError, Result};
use nix::mqueue::{MQ_OFlag, MqAttr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest message size the kernel accepts (Linux 3.5+ `HARD_MSGSIZEMAX`).
pub const MSGSIZE_MAX: usize = 16 * 1024 * 1024;

/// Priorities must be strictly below this value.
pub const MQ_PRIO_MAX: u32 = 32768;

/// Attributes applied when a queue is created.
///
/// Ignored by the kernel when an existing queue is opened, although the
/// handle still sizes its receive buffer from `max_message_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttributes {
    /// Passed through as `mq_flags`. The kernel ignores it on creation.
    #[serde(default)]
    pub flags: i64,
    pub max_messages: usize,
    pub max_message_size: usize,
}

impl QueueAttributes {
    pub fn new(max_messages: usize, max_message_size: usize) -> Self {
        Self {
            flags: 0,
            max_messages,
            max_message_size,
        }
    }

    /// Checks the values that can be rejected without asking the kernel.
    ///
    /// Upper bounds depend on `/proc/sys/fs/mqueue` and on the caller's
    /// privileges, so those are left to `mq_open`.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(MqError::InvalidAttributes(
                "max_messages must be positive".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(MqError::InvalidAttributes(
                "max_message_size must be positive".to_string(),
            ));
        }
        if i64::try_from(self.max_messages).is_err() || i64::try_from(self.max_message_size).is_err()
        {
            return Err(MqError::InvalidAttributes(format!(
                "values out of range: max_messages={}, max_message_size={}",
                self.max_messages, self.max_message_size
            )));
        }
        Ok(())
    }

    pub(crate) fn to_native(self) -> MqAttr {
        MqAttr::new(
            self.flags,
            self.max_messages as i64,
            self.max_message_size as i64,
            0,
        )
    }
}

/// Attributes of an open queue as reported by `mq_getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub nonblocking: bool,
    pub max_messages: usize,
    pub max_message_size: usize,
    pub current_messages: usize,
}

impl From<MqAttr> for QueueStatus {
    fn from(attr: MqAttr) -> Self {
        let nonblocking = MQ_OFlag::from_bits_truncate(attr.flags() as libc::c_int)
            .contains(MQ_OFlag::O_NONBLOCK);
        Self {
            nonblocking,
            max_messages: attr.maxmsg() as usize,
            max_message_size: attr.msgsize() as usize,
            current_messages: attr.curmsgs() as usize,
        }
    }
}

/// System-wide ceilings from `/proc/sys/fs/mqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLimits {
    /// Ceiling on `max_messages` for unprivileged creators.
    pub msg_max: usize,
    /// Ceiling on `max_message_size` for unprivileged creators.
    pub msgsize_max: usize,
    /// Number of queues that may exist system-wide.
    pub queues_max: usize,
}

impl SystemLimits {
    pub const PROC_DIR: &'static str = "/proc/sys/fs/mqueue";

    pub fn read() -> Result<Self> {
        Self::read_from(Path::new(Self::PROC_DIR))
    }

    pub fn read_from(dir: &Path) -> Result<Self> {
        Ok(Self {
            msg_max: read_limit(&dir.join("msg_max"))?,
            msgsize_max: read_limit(&dir.join("msgsize_max"))?,
            queues_max: read_limit(&dir.join("queues_max"))?,
        })
    }
}

fn read_limit(path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path).map_err(|source| MqError::Io {
        path: path.display().to_string(),
        source,
    })?;
    text.trim().parse().map_err(|_| MqError::Io {
        path: path.display().to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("not a number: {:?}", text.trim()),
        ),
    })
}
