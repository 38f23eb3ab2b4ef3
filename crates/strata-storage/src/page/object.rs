//! Object header encoding.
//!
//! Every object stored in a data page starts with an 8-byte header followed
//! by its payload, padded with zeros to the next multiple of
//! [`OBJECT_ALIGNMENT`](strata_common::constants::OBJECT_ALIGNMENT) bytes.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       1   properties
//!   1       1   reserved
//!   2       2   tag
//!   4       4   length (logical payload length)
//! ```

use bytes::{Buf, BufMut};

use super::aligned_length;

/// Size of an object header in bytes.
pub const OBJECT_HEADER_SIZE: usize = 8;

/// Header stored in front of every object.
///
/// `properties` and `tag` are opaque to the object manager; callers use them
/// for their own metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectHeader {
    /// Caller-defined property bits.
    pub properties: u8,
    /// Caller-defined tag.
    pub tag: u16,
    /// Logical payload length in bytes.
    pub length: u32,
}

impl ObjectHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = OBJECT_HEADER_SIZE;

    /// Creates a new object header.
    #[must_use]
    pub const fn new(properties: u8, tag: u16, length: u32) -> Self {
        Self {
            properties,
            tag,
            length,
        }
    }

    /// Serializes the header.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.properties);
        buf.put_u8(0); // reserved
        buf.put_u16_le(self.tag);
        buf.put_u32_le(self.length);
    }

    /// Serializes the header to a fixed-size array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        self.serialize(&mut bytes.as_mut_slice());
        bytes
    }

    /// Deserializes a header.
    ///
    /// The buffer must hold at least [`Self::SIZE`] bytes.
    pub fn deserialize(buf: &mut impl Buf) -> Self {
        let properties = buf.get_u8();
        let _reserved = buf.get_u8();
        let tag = buf.get_u16_le();
        let length = buf.get_u32_le();
        Self {
            properties,
            tag,
            length,
        }
    }

    /// Deserializes a header from the front of `bytes`.
    #[must_use]
    pub fn from_bytes(mut bytes: &[u8]) -> Self {
        Self::deserialize(&mut bytes)
    }

    /// Returns the payload length rounded up to the alignment.
    #[inline]
    #[must_use]
    pub const fn aligned_length(&self) -> usize {
        aligned_length(self.length as usize)
    }

    /// Returns the bytes the object occupies in the data area.
    #[inline]
    #[must_use]
    pub const fn stored_size(&self) -> usize {
        OBJECT_HEADER_SIZE + self.aligned_length()
    }
}
