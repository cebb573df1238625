use crate::attr::QueueAttributes;
use crate::config::{Access, QueueConfig};
use crate::utils::deadline_after;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// pmq - send, receive and inspect POSIX message queues
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Verbose output
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Also write log output to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a message
    Send(SendArgs),

    /// Receive one or more messages
    Recv(RecvArgs),

    /// Show a queue's attributes and current depth
    Stat {
        /// Queue name, e.g. /jobs
        name: String,

        /// Print as JSON
        #[clap(long, default_value_t = false)]
        json: bool,
    },

    /// Remove a queue name from the system
    Unlink {
        /// Queue name, e.g. /jobs
        name: String,

        /// Succeed even if the queue does not exist
        #[clap(short = 'f', long, default_value_t = false)]
        force: bool,
    },

    /// Show the system-wide limits from /proc/sys/fs/mqueue
    Limits {
        /// Print as JSON
        #[clap(long, default_value_t = false)]
        json: bool,
    },
}

/// Options shared by every command that opens a queue
#[derive(clap::Args, Debug, Clone)]
pub struct QueueArgs {
    /// Queue name, e.g. /jobs
    pub name: String,

    /// Access direction
    #[clap(short = 'a', long, value_enum, default_value_t = Access::ReadWrite)]
    pub access: Access,

    /// Create the queue if it does not exist
    #[clap(short = 'c', long, default_value_t = false)]
    pub create: bool,

    /// Fail if the queue already exists (requires --create)
    #[clap(long, requires = "create", default_value_t = false)]
    pub exclusive: bool,

    /// Fail instead of waiting when the queue is full or empty
    #[clap(short = 'n', long, default_value_t = false)]
    pub nonblocking: bool,

    /// Octal permission bits used when creating
    #[clap(long, value_parser = parse_mode, default_value = "600")]
    pub mode: u32,

    /// Maximum number of messages (creation only)
    #[clap(long)]
    pub max_messages: Option<usize>,

    /// Maximum message size in bytes (creation; also sizes the receive buffer)
    #[clap(long)]
    pub max_message_size: Option<usize>,
}

/// How long a send or receive may wait
#[derive(clap::Args, Debug, Clone, Default)]
pub struct WaitArgs {
    /// Give up after this long (e.g. "500ms", "5s", "1m")
    #[clap(short = 't', long, value_parser = parse_duration, conflicts_with = "deadline")]
    pub timeout: Option<Duration>,

    /// Give up at this RFC 3339 time (e.g. "2026-10-16T12:00:00Z")
    #[clap(long, value_parser = parse_deadline)]
    pub deadline: Option<SystemTime>,
}

impl WaitArgs {
    /// Absolute deadline, computed at call time for relative timeouts.
    pub fn deadline(&self) -> crate::Result<Option<SystemTime>> {
        match (self.deadline, self.timeout) {
            (Some(deadline), _) => Ok(Some(deadline)),
            (None, Some(timeout)) => deadline_after(timeout).map(Some),
            (None, None) => Ok(None),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SendArgs {
    #[clap(flatten)]
    pub queue: QueueArgs,

    /// Message payload
    pub message: String,

    /// Message priority (higher is delivered first)
    #[clap(short = 'p', long, default_value_t = 0)]
    pub priority: u32,

    /// Send the message this many times
    #[clap(short = 'r', long, default_value_t = 1)]
    pub repeat: usize,

    #[clap(flatten)]
    pub wait: WaitArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RecvArgs {
    #[clap(flatten)]
    pub queue: QueueArgs,

    /// Number of messages to receive
    #[clap(long, default_value_t = 1)]
    pub count: usize,

    /// Keep receiving until interrupted
    #[clap(short = 'f', long, default_value_t = false)]
    pub follow: bool,

    /// Print each message as a JSON line
    #[clap(long, default_value_t = false)]
    pub json: bool,

    #[clap(flatten)]
    pub wait: WaitArgs,
}

impl From<&QueueArgs> for QueueConfig {
    fn from(args: &QueueArgs) -> Self {
        let attributes = if args.create
            || args.max_messages.is_some()
            || args.max_message_size.is_some()
        {
            Some(QueueAttributes::new(
                args.max_messages.unwrap_or(crate::defaults::MAX_MESSAGES),
                args.max_message_size
                    .unwrap_or(crate::defaults::MAX_MESSAGE_SIZE),
            ))
        } else {
            None
        };

        Self {
            name: args.name.clone(),
            access: args.access,
            create: args.create,
            exclusive: args.exclusive,
            nonblocking: args.nonblocking,
            cloexec: true,
            mode: args.mode,
            attributes,
        }
    }
}

/// Parse a duration such as "250ms", "1.5s", "2m" or "1h". A bare number
/// is taken as seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let value = s.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let unit = &s[value.len()..];

    let scale = match unit {
        "ms" => 0.001,
        "" | "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(format!("Unknown duration unit {:?} in {:?}", unit, s)),
    };
    let value: f64 = value
        .parse()
        .map_err(|_| format!("Invalid duration {:?}", s))?;

    Duration::try_from_secs_f64(value * scale)
        .map_err(|e| format!("Invalid duration {:?}: {}", s, e))
}

/// Parse an absolute RFC 3339 timestamp
fn parse_deadline(s: &str) -> Result<SystemTime, String> {
    chrono::DateTime::parse_from_rfc3339(s.trim())
        .map(SystemTime::from)
        .map_err(|e| format!("Invalid deadline {:?}: {}", s, e))
}

/// Parse octal permission bits (e.g., "600", "0o644", "0640")
fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("Invalid octal mode: {}", s))?;
    if mode > 0o7777 {
        return Err(format!("Mode out of range: {}", s));
    }
    Ok(mode)
}
