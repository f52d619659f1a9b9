use bytes::{Bytes, BytesMut};

/// A fixed set of pre-allocated content buffers for one connection.
///
/// One slot per message a connection may deliver in a single tick. A
/// message is read into slot `i` and handed out as a `Bytes` view over
/// that slot's allocation, so delivering a message copies nothing.
///
/// # Reuse
///
/// When the caller drops the view before the slot is needed again, the
/// slot reclaims its original allocation in place. A view that is kept
/// alive stays valid; the slot then allocates fresh space for its next
/// message instead.
#[derive(Debug)]
pub struct BufferRing {
    slots: Vec<BytesMut>,
    slot_capacity: usize,
}

impl BufferRing {
    /// Allocate `slots` buffers of `slot_capacity` bytes each.
    #[must_use]
    pub fn new(slots: usize, slot_capacity: usize) -> Self {
        Self {
            slots: (0..slots)
                .map(|_| BytesMut::with_capacity(slot_capacity))
                .collect(),
            slot_capacity,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Size slot `index` to exactly `len` bytes and return it for filling.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn prepare(&mut self, index: usize, len: usize) -> &mut [u8] {
        let slot = &mut self.slots[index];
        slot.clear();
        slot.reserve(len);
        slot.resize(len, 0);
        &mut slot[..]
    }

    /// Hand out the filled contents of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn take(&mut self, index: usize) -> Bytes {
        self.slots[index].split().freeze()
    }
}
