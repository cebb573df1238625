//! # Message Queue Handle
//!
//! [`MessageQueue`] owns exactly one open queue descriptor together with the
//! [`ReceiveBuffer`] that every receive on it writes into. The two are acquired
//! together by [`MessageQueue::open`] and released together by
//! [`MessageQueue::close`], [`MessageQueue::unlink`] or `Drop`.
//!
//! ## Lifecycle contract
//!
//! - `open` either returns a fully usable handle or an error. A descriptor that
//!   was opened before a later step failed is closed before the error returns.
//! - `close` is terminal. A second `close` returns [`MqError::NotOpen`].
//! - `unlink` closes the handle and then removes the name. Unlinking an already
//!   closed handle returns [`MqError::NotOpen`] without touching the name.
//! - Dropping an open handle closes it and logs any failure.
//!
//! ## Receiving
//!
//! `receive` and `timed_receive` copy the message out of the internal buffer.
//! `receive_view` and `timed_receive_view` skip the copy and return a
//! [`MessageView`] borrowing the buffer; the borrow checker stops the next
//! receive until the view is gone.

use crate::attr::{QueueAttributes, QueueStatus};
use crate::buffer::ReceiveBuffer;
use crate::error::{MqError, Operation, Result};
use crate::sys;
use crate::utils::{deadline_after, deadline_to_timespec, validate_queue_name};
use nix::errno::Errno;
use nix::mqueue::{
    mq_close, mq_getattr, mq_open, mq_receive, mq_remove_nonblock, mq_send, mq_set_nonblock,
    mq_unlink, MQ_OFlag, MqdT,
};
use nix::sys::signal::Signal;
use nix::sys::stat::Mode;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace, warn};

/// A received message with its payload copied out of the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    pub priority: u32,
}

/// A received message still sitting in the handle's receive buffer.
///
/// Valid until the next receive on the same handle; the borrow enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageView<'a> {
    pub payload: &'a [u8],
    pub priority: u32,
}

impl MessageView<'_> {
    pub fn to_message(&self) -> Message {
        Message {
            payload: self.payload.to_vec(),
            priority: self.priority,
        }
    }
}

/// Descriptor and buffer of an open handle. Released as a unit.
struct OpenQueue {
    mqd: MqdT,
    buffer: ReceiveBuffer,
}

/// Safe handle over one open POSIX message queue.
pub struct MessageQueue {
    name: String,
    open: Option<OpenQueue>,
    unlinked: bool,
}

impl MessageQueue {
    /// Open (and with `O_CREAT`, possibly create) the queue called `name`.
    ///
    /// `flags` and `mode` are passed to `mq_open` unchanged. `attributes` only
    /// take effect when the queue is created; they also fix the receive buffer
    /// capacity. Without them the buffer is sized to the queue's own message
    /// size, read back from the kernel.
    pub fn open(
        name: &str,
        flags: MQ_OFlag,
        mode: Mode,
        attributes: Option<&QueueAttributes>,
    ) -> Result<Self> {
        validate_queue_name(name)?;
        if let Some(attributes) = attributes {
            attributes.validate()?;
        }

        let native = attributes.map(|a| a.to_native());
        let mqd = mq_open(name, flags, mode, native.as_ref())
            .map_err(|e| MqError::sys(Operation::Open, e))?;
        debug!("Opened message queue '{}' with fd: {}", name, mqd.as_raw_fd());

        let buffer = match Self::allocate_buffer(&mqd, attributes) {
            Ok(buffer) => buffer,
            Err(e) => {
                if let Err(close_err) = mq_close(mqd) {
                    warn!("Failed to close message queue '{}': {}", name, close_err);
                }
                return Err(e);
            }
        };

        Ok(Self {
            name: name.to_string(),
            open: Some(OpenQueue { mqd, buffer }),
            unlinked: false,
        })
    }

    fn allocate_buffer(mqd: &MqdT, attributes: Option<&QueueAttributes>) -> Result<ReceiveBuffer> {
        let capacity = match attributes {
            Some(attributes) => attributes.max_message_size,
            None => {
                let attr = mq_getattr(mqd).map_err(|e| MqError::sys(Operation::GetAttr, e))?;
                attr.msgsize() as usize
            }
        };
        ReceiveBuffer::with_capacity(capacity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// True once `unlink` has removed the name.
    pub fn is_unlinked(&self) -> bool {
        self.unlinked
    }

    /// Receive buffer capacity, or `None` when closed.
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.open.as_ref().map(|q| q.buffer.capacity())
    }

    fn queue(&self) -> Result<&OpenQueue> {
        self.open.as_ref().ok_or(MqError::NotOpen)
    }

    /// Enqueue `payload` at `priority`, blocking while the queue is full
    /// unless the handle is nonblocking.
    pub fn send(&self, payload: &[u8], priority: u32) -> Result<()> {
        let q = self.queue()?;
        mq_send(&q.mqd, payload, priority).map_err(|e| MqError::sys(Operation::Send, e))?;
        trace!("Sent {} bytes at priority {} to '{}'", payload.len(), priority, self.name);
        Ok(())
    }

    /// Like [`send`](Self::send) but gives up with `TimedOut` at `deadline`.
    pub fn timed_send(&self, payload: &[u8], priority: u32, deadline: SystemTime) -> Result<()> {
        let q = self.queue()?;
        let abs = deadline_to_timespec(deadline)?;
        sys::timed_send(&q.mqd, payload, priority, &abs)
            .map_err(|e| MqError::sys(Operation::Send, e))?;
        trace!("Sent {} bytes at priority {} to '{}'", payload.len(), priority, self.name);
        Ok(())
    }

    pub fn send_timeout(&self, payload: &[u8], priority: u32, timeout: Duration) -> Result<()> {
        self.timed_send(payload, priority, deadline_after(timeout)?)
    }

    /// Dequeue the highest-priority, oldest message.
    pub fn receive(&mut self) -> Result<Message> {
        self.receive_view().map(|view| view.to_message())
    }

    /// Like [`receive`](Self::receive) but gives up with `TimedOut` at `deadline`.
    pub fn timed_receive(&mut self, deadline: SystemTime) -> Result<Message> {
        self.timed_receive_view(deadline)
            .map(|view| view.to_message())
    }

    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Message> {
        self.timed_receive(deadline_after(timeout)?)
    }

    /// Receive without copying: the payload borrows the internal buffer.
    pub fn receive_view(&mut self) -> Result<MessageView<'_>> {
        let q = self.open.as_mut().ok_or(MqError::NotOpen)?;
        let mut priority = 0u32;
        let len = mq_receive(&q.mqd, q.buffer.as_mut_slice(), &mut priority)
            .map_err(|e| MqError::sys(Operation::Receive, e))?;
        trace!("Received {} bytes at priority {} from '{}'", len, priority, self.name);
        Ok(MessageView {
            payload: q.buffer.filled(len),
            priority,
        })
    }

    pub fn timed_receive_view(&mut self, deadline: SystemTime) -> Result<MessageView<'_>> {
        let abs = deadline_to_timespec(deadline)?;
        let q = self.open.as_mut().ok_or(MqError::NotOpen)?;
        let (len, priority) = sys::timed_receive(&q.mqd, q.buffer.as_mut_slice(), &abs)
            .map_err(|e| MqError::sys(Operation::Receive, e))?;
        trace!("Received {} bytes at priority {} from '{}'", len, priority, self.name);
        Ok(MessageView {
            payload: q.buffer.filled(len),
            priority,
        })
    }

    /// Ask for `signal` the next time a message arrives on an empty queue.
    ///
    /// One-shot: the registration is consumed when the signal fires and must
    /// be renewed. Only one process may be registered per queue; a second
    /// registration fails with `EBUSY` (kind `Other`). Signal delivery itself
    /// is platform specific.
    pub fn notify(&self, signal: Signal) -> Result<()> {
        let q = self.queue()?;
        sys::notify(&q.mqd, Some(signal)).map_err(|e| MqError::sys(Operation::Notify, e))?;
        debug!("Registered {} notification on '{}'", signal, self.name);
        Ok(())
    }

    /// Remove this process's notification registration.
    pub fn cancel_notify(&self) -> Result<()> {
        let q = self.queue()?;
        sys::notify(&q.mqd, None).map_err(|e| MqError::sys(Operation::Notify, e))?;
        debug!("Cancelled notification on '{}'", self.name);
        Ok(())
    }

    /// Current attributes, including how many messages are waiting.
    pub fn status(&self) -> Result<QueueStatus> {
        let q = self.queue()?;
        mq_getattr(&q.mqd)
            .map(QueueStatus::from)
            .map_err(|e| MqError::sys(Operation::GetAttr, e))
    }

    /// Switch this descriptor between blocking and nonblocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let q = self.queue()?;
        let result = if nonblocking {
            mq_set_nonblock(&q.mqd)
        } else {
            mq_remove_nonblock(&q.mqd)
        };
        result.map_err(|e| MqError::sys(Operation::SetAttr, e))?;
        debug!("Set nonblocking={} on '{}'", nonblocking, self.name);
        Ok(())
    }

    /// Release the descriptor and the receive buffer.
    pub fn close(&mut self) -> Result<()> {
        let OpenQueue { mqd, buffer } = self.open.take().ok_or(MqError::NotOpen)?;
        drop(buffer);
        mq_close(mqd).map_err(|e| MqError::sys(Operation::Close, e))?;
        debug!("Closed message queue '{}'", self.name);
        Ok(())
    }

    /// Close the handle, then remove the name from the system.
    ///
    /// Other handles on the same queue keep working; the kernel destroys the
    /// queue once the last of them is closed.
    pub fn unlink(&mut self) -> Result<()> {
        self.close()?;
        mq_unlink(self.name.as_str()).map_err(|e| MqError::sys(Operation::Unlink, e))?;
        self.unlinked = true;
        debug!("Unlinked message queue '{}'", self.name);
        Ok(())
    }
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("fd", &self.open.as_ref().map(|q| q.mqd.as_raw_fd()))
            .field("buffer_capacity", &self.buffer_capacity())
            .field("unlinked", &self.unlinked)
            .finish()
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        if self.open.is_some() {
            if let Err(e) = self.close() {
                warn!("Failed to close message queue '{}': {}", self.name, e);
            }
        }
    }
}

/// Remove `name` from the system without opening it.
pub fn unlink_queue(name: &str) -> Result<()> {
    validate_queue_name(name)?;
    mq_unlink(name).map_err(|e| MqError::sys(Operation::Unlink, e))?;
    debug!("Unlinked message queue '{}'", name);
    Ok(())
}

/// Remove `name` from the system, treating an already missing name as success.
pub fn remove_queue(name: &str) -> Result<()> {
    validate_queue_name(name)?;
    match mq_unlink(name) {
        Ok(()) => {
            debug!("Removed message queue '{}'", name);
            Ok(())
        }
        Err(Errno::ENOENT) => Ok(()),
        Err(e) => Err(MqError::sys(Operation::Unlink, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::utils::unique_queue_name;

    fn create(name: &str, flags: MQ_OFlag, max_messages: usize, size: usize) -> Result<MessageQueue> {
        let attrs = QueueAttributes::new(max_messages, size);
        MessageQueue::open(
            name,
            flags | MQ_OFlag::O_CREAT,
            Mode::S_IRUSR | Mode::S_IWUSR,
            Some(&attrs),
        )
    }

    /// Skips when the kernel facility is unavailable in this environment.
    fn available() -> bool {
        let name = unique_queue_name("pmq_unit_probe");
        match create(&name, MQ_OFlag::O_RDWR, 1, 16) {
            Ok(mut mq) => mq.unlink().is_ok(),
            Err(e) => {
                eprintln!("Skipping message queue test: {}", e);
                false
            }
        }
    }

    #[test]
    fn test_malformed_name_is_rejected_before_open() {
        let err = create("noslash", MQ_OFlag::O_WRONLY, 1, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.errno().is_none());
    }

    #[test]
    fn test_invalid_attributes_are_rejected_before_open() {
        let name = unique_queue_name("pmq_unit");
        let err = create(&name, MQ_OFlag::O_WRONLY, 0, 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_buffer_sized_from_attributes() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut mq = create(&name, MQ_OFlag::O_RDWR, 4, 100).unwrap();
        assert_eq!(mq.buffer_capacity(), Some(100));
        mq.unlink().unwrap();
        assert_eq!(mq.buffer_capacity(), None);
        assert!(mq.is_unlinked());
    }

    #[test]
    fn test_buffer_sized_from_kernel_without_attributes() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut creator = create(&name, MQ_OFlag::O_RDWR, 4, 300).unwrap();
        let opener = MessageQueue::open(&name, MQ_OFlag::O_RDONLY, Mode::empty(), None).unwrap();
        assert_eq!(opener.buffer_capacity(), Some(300));
        drop(opener);
        creator.unlink().unwrap();
    }

    #[test]
    fn test_second_close_is_not_open() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut mq = create(&name, MQ_OFlag::O_RDWR, 1, 16).unwrap();
        mq.close().unwrap();
        assert!(!mq.is_open());
        assert_eq!(mq.close().unwrap_err().kind(), ErrorKind::NotOpen);
        assert_eq!(mq.send(b"x", 0).unwrap_err().kind(), ErrorKind::NotOpen);
        assert_eq!(mq.receive().unwrap_err().kind(), ErrorKind::NotOpen);
        assert_eq!(mq.unlink().unwrap_err().kind(), ErrorKind::NotOpen);
        remove_queue(&name).unwrap();
    }

    #[test]
    fn test_view_borrows_buffer() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut mq = create(&name, MQ_OFlag::O_RDWR, 2, 32).unwrap();
        mq.send(b"first", 3).unwrap();
        mq.send(b"second", 1).unwrap();

        let view = mq.receive_view().unwrap();
        assert_eq!(view.payload, b"first");
        assert_eq!(view.priority, 3);
        let owned = view.to_message();

        let next = mq.receive_view().unwrap();
        assert_eq!(next.payload, b"second");
        assert_eq!(owned.payload, b"first".to_vec());
        mq.unlink().unwrap();
    }

    #[test]
    fn test_status_counts_messages() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut mq = create(&name, MQ_OFlag::O_RDWR, 3, 64).unwrap();
        mq.send(b"a", 0).unwrap();
        mq.send(b"b", 0).unwrap();

        let status = mq.status().unwrap();
        assert_eq!(status.max_messages, 3);
        assert_eq!(status.max_message_size, 64);
        assert_eq!(status.current_messages, 2);
        assert!(!status.nonblocking);

        mq.set_nonblocking(true).unwrap();
        assert!(mq.status().unwrap().nonblocking);
        mq.unlink().unwrap();
    }

    #[test]
    fn test_unrepresentable_timeout_is_an_error() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit");
        let mut mq = create(&name, MQ_OFlag::O_RDWR, 1, 16).unwrap();
        let err = mq.receive_timeout(Duration::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = mq.send_timeout(b"x", 0, Duration::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(mq.status().unwrap().current_messages, 0);
        mq.unlink().unwrap();
    }

    #[test]
    fn test_remove_missing_queue_is_ok() {
        if !available() {
            return;
        }
        let name = unique_queue_name("pmq_unit_missing");
        remove_queue(&name).unwrap();
        assert_eq!(unlink_queue(&name).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
