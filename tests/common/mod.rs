#![allow(dead_code)]

use posix_mq::utils::unique_queue_name;
use posix_mq::{MQ_OFlag, MessageQueue, Mode, QueueAttributes};

/// PMQ needs kernel support and a usable RLIMIT_MSGQUEUE. Containers and
/// sandboxes often lack one or the other, so tests skip rather than fail.
pub fn pmq_available() -> bool {
    let name = unique_queue_name("pmq_it_probe");
    match create(&name, MQ_OFlag::O_RDWR, 1, 16) {
        Ok(mut mq) => mq.unlink().is_ok(),
        Err(e) => {
            eprintln!("Skipping PMQ test: {}", e);
            false
        }
    }
}

pub fn scratch_name() -> String {
    unique_queue_name("pmq_it")
}

/// Open with `O_CREAT` and owner read/write.
pub fn create(
    name: &str,
    flags: MQ_OFlag,
    max_messages: usize,
    max_message_size: usize,
) -> posix_mq::Result<MessageQueue> {
    let attrs = QueueAttributes::new(max_messages, max_message_size);
    MessageQueue::open(
        name,
        flags | MQ_OFlag::O_CREAT,
        Mode::S_IRUSR | Mode::S_IWUSR,
        Some(&attrs),
    )
}

pub fn open_existing(name: &str, flags: MQ_OFlag) -> posix_mq::Result<MessageQueue> {
    MessageQueue::open(name, flags, Mode::empty(), None)
}
