#![cfg(target_os = "linux")]

// Kept as the only test in this binary: it counts the process's open
// descriptors, which concurrent tests would disturb.

mod common;

use anyhow::Result;
use common::{create, pmq_available, scratch_name};
use posix_mq::{ErrorKind, MQ_OFlag, MessageQueue, Mode, QueueAttributes};

fn open_descriptors() -> Result<usize> {
    Ok(std::fs::read_dir("/proc/self/fd")?.count())
}

/// The kernel ignores attributes without `O_CREAT`, so the open succeeds and
/// only the receive buffer cannot be allocated. The descriptor must not leak.
#[test]
fn failed_buffer_allocation_releases_descriptor() -> Result<()> {
    if !pmq_available() {
        return Ok(());
    }
    let name = scratch_name();
    let mut owner = create(&name, MQ_OFlag::O_RDWR, 1, 16)?;

    let before = open_descriptors()?;
    let huge = QueueAttributes::new(1, i64::MAX as usize);
    let err = MessageQueue::open(&name, MQ_OFlag::O_RDONLY, Mode::empty(), Some(&huge))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert_eq!(open_descriptors()?, before);

    owner.unlink()?;
    Ok(())
}
