//! # pmq - POSIX Message Queue Tool
//!
//! Command-line front end for the `posix_mq` library:
//! - `send`: enqueue a message, optionally creating the queue
//! - `recv`: dequeue messages, optionally following until Ctrl-C
//! - `stat`: show attributes and current depth
//! - `unlink`: remove a queue name
//! - `limits`: show the system-wide ceilings
//!
//! ## Error Handling
//!
//! Library errors are wrapped with context via `anyhow` and reported once, by
//! `main`, with a non-zero exit status.
//!
//! ## Concurrency Model
//!
//! Blocking queue calls run on Tokio's blocking pool through
//! `AsyncMessageQueue`. `recv` waits in slices of at most
//! `defaults::POLL_INTERVAL` and checks for Ctrl-C between them, so an
//! interrupt never abandons a receive that could still dequeue a message.

use anyhow::{Context, Result};
use clap::Parser;
use posix_mq::{
    cli::{Args, Command, RecvArgs, SendArgs},
    defaults, logging,
    utils::{deadline_after, format_bytes},
    AsyncMessageQueue, ErrorKind, MessageQueue, Mode, MQ_OFlag, QueueConfig, SystemLimits,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One received message as printed by `recv --json`
#[derive(Debug, Serialize)]
struct ReceivedRecord {
    timestamp: chrono::DateTime<chrono::Utc>,
    priority: u32,
    size: usize,
    payload: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;
    debug!("Arguments: {:?}", args);

    match args.command {
        Command::Send(send) => run_send(send).await,
        Command::Recv(recv) => run_recv(recv).await,
        Command::Stat { name, json } => run_stat(&name, json),
        Command::Unlink { name, force } => run_unlink(&name, force),
        Command::Limits { json } => run_limits(json),
    }
}

async fn run_send(args: SendArgs) -> Result<()> {
    let config = QueueConfig::from(&args.queue);
    let mut queue = AsyncMessageQueue::open(config)
        .await
        .with_context(|| format!("failed to open queue '{}'", args.queue.name))?;

    let payload = args.message.into_bytes();
    for i in 0..args.repeat {
        let result = match args.wait.deadline()? {
            Some(deadline) => {
                queue
                    .timed_send(payload.clone(), args.priority, deadline)
                    .await
            }
            None => queue.send(payload.clone(), args.priority).await,
        };
        result.with_context(|| format!("failed to send message {}", i + 1))?;
        info!(
            "Sent {} to '{}' at priority {}",
            format_bytes(payload.len()),
            args.queue.name,
            args.priority
        );
    }

    queue.close().await?;
    Ok(())
}

async fn run_recv(args: RecvArgs) -> Result<()> {
    let config = QueueConfig::from(&args.queue);
    let mut queue = AsyncMessageQueue::open(config)
        .await
        .with_context(|| format!("failed to open queue '{}'", args.queue.name))?;

    // A receive already handed to the kernel is never abandoned: Ctrl-C only
    // raises a flag, which is checked between bounded waits.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut received = 0usize;
    'messages: while args.follow || received < args.count {
        let deadline = args.wait.deadline()?;

        let message = loop {
            if interrupted.load(Ordering::SeqCst) {
                info!("Interrupted after {} messages", received);
                break 'messages;
            }

            let poll = deadline_after(defaults::POLL_INTERVAL)?;
            let (wait_until, last_wait) = match deadline {
                Some(deadline) if deadline <= poll => (deadline, true),
                _ => (poll, false),
            };

            match queue.timed_receive(wait_until).await {
                Ok(message) => break message,
                Err(e) if e.kind() == ErrorKind::TimedOut && !last_wait => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to receive from '{}'", args.queue.name))
                }
            }
        };
        received += 1;

        if args.json {
            let record = ReceivedRecord {
                timestamp: chrono::Utc::now(),
                priority: message.priority,
                size: message.payload.len(),
                payload: String::from_utf8_lossy(&message.payload).into_owned(),
            };
            println!("{}", serde_json::to_string(&record)?);
        } else {
            println!(
                "[{}] {}",
                message.priority,
                String::from_utf8_lossy(&message.payload)
            );
        }
    }

    queue.close().await?;
    Ok(())
}

fn run_stat(name: &str, json: bool) -> Result<()> {
    let queue = MessageQueue::open(name, MQ_OFlag::O_RDONLY, Mode::empty(), None)
        .with_context(|| format!("failed to open queue '{}'", name))?;
    let status = queue.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Queue:            {}", name);
        println!("Messages:         {}/{}", status.current_messages, status.max_messages);
        println!(
            "Max message size: {} ({} bytes)",
            format_bytes(status.max_message_size),
            status.max_message_size
        );
        println!("Nonblocking:      {}", status.nonblocking);
    }
    Ok(())
}

fn run_unlink(name: &str, force: bool) -> Result<()> {
    let result = if force {
        posix_mq::remove_queue(name)
    } else {
        posix_mq::unlink_queue(name)
    };
    result.with_context(|| format!("failed to unlink queue '{}'", name))?;
    info!("Unlinked '{}'", name);
    Ok(())
}

fn run_limits(json: bool) -> Result<()> {
    let limits = SystemLimits::read()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&limits)?);
    } else {
        println!("msg_max:     {}", limits.msg_max);
        println!("msgsize_max: {} ({})", limits.msgsize_max, format_bytes(limits.msgsize_max));
        println!("queues_max:  {}", limits.queues_max);
    }
    Ok(())
}
