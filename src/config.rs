//! Open configuration expressed as independent options rather than raw bits.
//!
//! [`QueueConfig`] is what the `pmq` binary builds from its arguments and what
//! callers can load from JSON. [`QueueConfig::flags`] produces the exact
//! `mq_open` flag set; nothing is reinterpreted on the way.

use crate::attr::QueueAttributes;
use crate::error::Result;
use crate::queue::MessageQueue;
use clap::ValueEnum;
use nix::mqueue::MQ_OFlag;
use nix::sys::stat::Mode;
use serde::{Deserialize, Serialize};

/// Access direction of the handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[clap(name = "read")]
    ReadOnly,
    #[clap(name = "write")]
    WriteOnly,
    #[default]
    #[clap(name = "rw")]
    ReadWrite,
}

impl Access {
    fn flag(self) -> MQ_OFlag {
        match self {
            Access::ReadOnly => MQ_OFlag::O_RDONLY,
            Access::WriteOnly => MQ_OFlag::O_WRONLY,
            Access::ReadWrite => MQ_OFlag::O_RDWR,
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::ReadOnly => write!(f, "read-only"),
            Access::WriteOnly => write!(f, "write-only"),
            Access::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Everything needed to open a queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    /// Create the queue if it does not exist.
    #[serde(default)]
    pub create: bool,
    /// With `create`, fail if the queue already exists.
    #[serde(default)]
    pub exclusive: bool,
    /// Send and receive fail with `WouldBlock` instead of suspending.
    #[serde(default)]
    pub nonblocking: bool,
    #[serde(default = "default_cloexec")]
    pub cloexec: bool,
    /// Permission bits, used only when creating.
    #[serde(default = "default_mode")]
    pub mode: u32,
    #[serde(default)]
    pub attributes: Option<QueueAttributes>,
}

fn default_cloexec() -> bool {
    true
}

fn default_mode() -> u32 {
    crate::defaults::PERMISSIONS
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: Access::default(),
            create: false,
            exclusive: false,
            nonblocking: false,
            cloexec: default_cloexec(),
            mode: default_mode(),
            attributes: None,
        }
    }

    pub fn flags(&self) -> MQ_OFlag {
        let mut flags = self.access.flag();
        if self.create {
            flags |= MQ_OFlag::O_CREAT;
        }
        if self.exclusive {
            flags |= MQ_OFlag::O_EXCL;
        }
        if self.nonblocking {
            flags |= MQ_OFlag::O_NONBLOCK;
        }
        if self.cloexec {
            flags |= MQ_OFlag::O_CLOEXEC;
        }
        flags
    }

    pub fn permissions(&self) -> Mode {
        Mode::from_bits_truncate(self.mode as libc::mode_t)
    }

    pub fn open(&self) -> Result<MessageQueue> {
        MessageQueue::open(
            &self.name,
            self.flags(),
            self.permissions(),
            self.attributes.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_match_mq_open_bits() {
        let mut config = QueueConfig::new("/q");
        config.cloexec = false;
        assert_eq!(config.flags(), MQ_OFlag::O_RDWR);

        config.access = Access::WriteOnly;
        config.create = true;
        config.exclusive = true;
        config.nonblocking = true;
        config.cloexec = true;
        assert_eq!(
            config.flags().bits(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_EXCL | libc::O_NONBLOCK | libc::O_CLOEXEC
        );
    }

    #[test]
    fn test_read_only_is_zero() {
        let mut config = QueueConfig::new("/q");
        config.access = Access::ReadOnly;
        config.cloexec = false;
        assert_eq!(config.flags().bits(), libc::O_RDONLY);
    }

    #[test]
    fn test_permissions_keep_mode_bits() {
        let mut config = QueueConfig::new("/q");
        config.mode = 0o640;
        assert_eq!(
            config.permissions(),
            Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP
        );
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: QueueConfig = serde_json::from_str(
            r#"{"name": "/jobs", "create": true, "attributes": {"max_messages": 8, "max_message_size": 256}}"#,
        )
        .unwrap();
        assert_eq!(config.access, Access::ReadWrite);
        assert!(config.create);
        assert!(!config.exclusive);
        assert!(config.cloexec);
        assert_eq!(config.mode, crate::defaults::PERMISSIONS);
        assert_eq!(config.attributes, Some(QueueAttributes::new(8, 256)));
    }
}
