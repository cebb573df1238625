//! Calls that `nix::mqueue` does not wrap.
//!
//! Each function borrows the descriptor for the duration of the call only and
//! returns the raw `Errno` so the caller can attach the operation.

use nix::errno::Errno;
use nix::mqueue::MqdT;
use nix::sys::signal::{SigEvent, SigevNotify, Signal};
use nix::sys::time::TimeSpec;
use std::os::unix::io::AsRawFd;
use std::ptr;

pub(crate) fn timed_send(
    mqd: &MqdT,
    payload: &[u8],
    priority: u32,
    deadline: &TimeSpec,
) -> Result<(), Errno> {
    let abs_timeout: &libc::timespec = deadline.as_ref();
    // SAFETY: the pointers come from live borrows that outlast the call.
    let ret = unsafe {
        libc::mq_timedsend(
            mqd.as_raw_fd(),
            payload.as_ptr().cast(),
            payload.len(),
            priority as libc::c_uint,
            abs_timeout,
        )
    };
    Errno::result(ret).map(drop)
}

/// Returns the message length and its priority.
pub(crate) fn timed_receive(
    mqd: &MqdT,
    buffer: &mut [u8],
    deadline: &TimeSpec,
) -> Result<(usize, u32), Errno> {
    let abs_timeout: &libc::timespec = deadline.as_ref();
    let mut priority: libc::c_uint = 0;
    // SAFETY: `buffer` is writable for `buffer.len()` bytes and outlives the call.
    let ret = unsafe {
        libc::mq_timedreceive(
            mqd.as_raw_fd(),
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            &mut priority,
            abs_timeout,
        )
    };
    let len = Errno::result(ret)?;
    Ok((len as usize, priority as u32))
}

/// Registers `signal` for delivery on the next arrival to an empty queue, or
/// removes the current registration when `signal` is `None`.
pub(crate) fn notify(mqd: &MqdT, signal: Option<Signal>) -> Result<(), Errno> {
    let ret = match signal {
        Some(signal) => {
            let event = SigEvent::new(SigevNotify::SigevSignal {
                signal,
                si_value: 0,
            })
            .sigevent();
            // SAFETY: `event` is a fully initialised sigevent on the stack.
            unsafe { libc::mq_notify(mqd.as_raw_fd(), &event) }
        }
        // SAFETY: a null sigevent is the documented way to unregister.
        None => unsafe { libc::mq_notify(mqd.as_raw_fd(), ptr::null()) },
    };
    Errno::result(ret).map(drop)
}
