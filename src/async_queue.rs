//! # Tokio Adapter
//!
//! Message-queue calls block the calling thread, so inside an async runtime
//! they have to run on the blocking pool. [`AsyncMessageQueue`] owns a
//! [`MessageQueue`] and, for every call, moves it into
//! `tokio::task::spawn_blocking` and takes it back when the call returns.
//!
//! ## Cancellation
//!
//! None of the operations are cancel safe. Dropping a future mid-call does
//! not stop the blocking task: the system call runs to completion, the handle
//! is then dropped (and closed) with it, and the adapter is left closed. A
//! receive that completes that way has already taken its message off the
//! queue, and the message is lost with the handle. Do not race `receive` in
//! `tokio::select!`; wait with short `timed_receive` deadlines instead and
//! check for cancellation between calls.

use crate::attr::QueueStatus;
use crate::config::QueueConfig;
use crate::error::{MqError, Result};
use crate::queue::{Message, MessageQueue};
use std::time::SystemTime;
use tracing::{debug, error};

pub struct AsyncMessageQueue {
    queue: Option<MessageQueue>,
}

impl AsyncMessageQueue {
    /// Open the queue described by `config` on the blocking pool.
    pub async fn open(config: QueueConfig) -> Result<Self> {
        let queue = tokio::task::spawn_blocking(move || config.open()).await??;
        Ok(Self { queue: Some(queue) })
    }

    pub fn from_queue(queue: MessageQueue) -> Self {
        Self { queue: Some(queue) }
    }

    /// Take the synchronous handle back, if the adapter still holds it.
    pub fn into_inner(mut self) -> Option<MessageQueue> {
        self.queue.take()
    }

    pub fn is_open(&self) -> bool {
        self.queue.as_ref().map_or(false, MessageQueue::is_open)
    }

    async fn run<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MessageQueue) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut queue = self.queue.take().ok_or(MqError::NotOpen)?;
        let joined = tokio::task::spawn_blocking(move || {
            let result = f(&mut queue);
            (queue, result)
        })
        .await;

        match joined {
            Ok((queue, result)) => {
                self.queue = Some(queue);
                result
            }
            Err(e) => {
                error!("Message queue task failed, handle lost: {}", e);
                Err(MqError::Task(e))
            }
        }
    }

    pub async fn send(&mut self, payload: Vec<u8>, priority: u32) -> Result<()> {
        self.run(move |q| q.send(&payload, priority)).await
    }

    pub async fn timed_send(
        &mut self,
        payload: Vec<u8>,
        priority: u32,
        deadline: SystemTime,
    ) -> Result<()> {
        self.run(move |q| q.timed_send(&payload, priority, deadline))
            .await
    }

    /// Blocks a pool thread until a message arrives. Not cancel safe: see the
    /// module docs.
    pub async fn receive(&mut self) -> Result<Message> {
        self.run(|q| q.receive()).await
    }

    pub async fn timed_receive(&mut self, deadline: SystemTime) -> Result<Message> {
        self.run(move |q| q.timed_receive(deadline)).await
    }

    pub async fn status(&mut self) -> Result<QueueStatus> {
        self.run(|q| q.status()).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.run(|q| q.close()).await?;
        debug!("Async message queue closed");
        Ok(())
    }

    pub async fn unlink(&mut self) -> Result<()> {
        self.run(|q| q.unlink()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::QueueAttributes;
    use crate::config::Access;
    use crate::error::ErrorKind;
    use crate::utils::{deadline_after, unique_queue_name};
    use std::time::Duration;

    fn scratch_config() -> QueueConfig {
        let mut config = QueueConfig::new(unique_queue_name("pmq_async"));
        config.access = Access::ReadWrite;
        config.create = true;
        config.attributes = Some(QueueAttributes::new(4, 128));
        config
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let mut queue = match AsyncMessageQueue::open(scratch_config()).await {
            Ok(queue) => queue,
            Err(e) => {
                eprintln!("Skipping async message queue test: {}", e);
                return;
            }
        };

        queue.send(vec![1, 2, 3, 4, 5], 2).await.unwrap();
        let message = queue.receive().await.unwrap();
        assert_eq!(message.payload, vec![1, 2, 3, 4, 5]);
        assert_eq!(message.priority, 2);

        let err = queue
            .timed_receive(deadline_after(Duration::from_millis(50)).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(queue.is_open());

        queue.unlink().await.unwrap();
        assert!(!queue.is_open());
        assert_eq!(queue.close().await.unwrap_err().kind(), ErrorKind::NotOpen);
    }

    #[tokio::test]
    async fn test_dropped_call_leaves_adapter_closed() {
        let config = scratch_config();
        let name = config.name.clone();
        let mut queue = match AsyncMessageQueue::open(config).await {
            Ok(queue) => queue,
            Err(e) => {
                eprintln!("Skipping async message queue test: {}", e);
                return;
            }
        };

        let deadline = deadline_after(Duration::from_millis(200)).unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), queue.timed_receive(deadline)).await;
        assert!(abandoned.is_err());
        assert!(!queue.is_open());
        assert_eq!(queue.status().await.unwrap_err().kind(), ErrorKind::NotOpen);

        crate::queue::remove_queue(&name).unwrap();
    }

    #[tokio::test]
    async fn test_open_error_is_reported() {
        let config = QueueConfig::new("missing-slash");
        let err = AsyncMessageQueue::open(config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
