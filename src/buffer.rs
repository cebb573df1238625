use crate::error::{MqError, Result};

/// Fixed-capacity scratch space that every receive on a handle writes into.
///
/// The capacity is chosen once, at open time, and never changes. Allocation
/// failure is reported as an error instead of aborting the process.
pub struct ReceiveBuffer {
    storage: Box<[u8]>,
}

impl ReceiveBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| MqError::BufferAllocation { size: capacity })?;
        storage.resize(capacity, 0);
        Ok(Self {
            storage: storage.into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The whole backing storage, handed to the kernel as the receive target.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// The first `len` bytes written by the last receive.
    pub(crate) fn filled(&self, len: usize) -> &[u8] {
        &self.storage[..len.min(self.storage.len())]
    }
}

impl std::fmt::Debug for ReceiveBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_capacity_is_fixed() {
        let mut buffer = ReceiveBuffer::with_capacity(64).unwrap();
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.as_mut_slice().len(), 64);
    }

    #[test]
    fn test_filled_is_clamped_to_capacity() {
        let mut buffer = ReceiveBuffer::with_capacity(4).unwrap();
        buffer.as_mut_slice().copy_from_slice(b"abcd");
        assert_eq!(buffer.filled(2), b"ab");
        assert_eq!(buffer.filled(10), b"abcd");
    }

    #[test]
    fn test_impossible_allocation_is_an_error() {
        let err = ReceiveBuffer::with_capacity(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }
}
