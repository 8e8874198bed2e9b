//! Message header with zero-copy parsing.
//!
//! The `MessageHeader` is a fixed 8-byte structure serialized as raw binary
//! (Big Endian). The receiver learns the message kind and payload size before
//! touching any CBOR.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    MAX_FRAME_SIZE, MessageKind,
    errors::{ProtocolError, Result},
};

/// Fixed 8-byte message header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the struct has alignment 1 and can
/// be cast from any byte slice.
///
/// # Security
///
/// The `#[repr(C, packed)]` layout with zerocopy traits ensures every 8-byte
/// pattern is a valid value. Semantic checks (magic, version, size limit)
/// happen in [`MessageHeader::from_bytes`] before the payload is looked at.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct MessageHeader {
    magic: [u8; 2],                   // 0x5054 ("PT")
    version: u8,                      // 0x01
    reserved: u8,                     // always zero on send, ignored on receive
    pub(crate) kind: [u8; 2],         // u16 MessageKind
    pub(crate) payload_size: [u8; 2], // u16 payload length
}

impl MessageHeader {
    /// Size of the serialized header (8 bytes)
    pub const SIZE: usize = 8;

    /// Magic number: "PT" in ASCII (0x5054)
    pub const MAGIC: u16 = 0x5054;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size so that header + payload fit in one frame
    pub const MAX_PAYLOAD_SIZE: u16 = (MAX_FRAME_SIZE - Self::SIZE) as u16;

    /// Create a header for a known kind with an empty payload.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self::with_raw_kind(kind.to_u16())
    }

    /// Create a header carrying an arbitrary kind value.
    ///
    /// Used by peers speaking a newer schema and by tests that exercise the
    /// unknown-kind path.
    #[must_use]
    pub fn with_raw_kind(kind: u16) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            reserved: 0,
            kind: kind.to_be_bytes(),
            payload_size: [0; 2],
        }
    }

    /// Parse header from the front of `bytes` (zero-copy)
    ///
    /// Trailing bytes (the payload) are ignored here.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 8 bytes are available
    /// - `ProtocolError::InvalidMagic` if the magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` if the version is not 1
    /// - `ProtocolError::PayloadTooLarge` if the declared payload cannot fit
    ///   in a frame
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        let magic = u16::from_be_bytes(header.magic);
        if magic != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u16::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u16 {
        u16::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message kind as raw u16.
    #[must_use]
    pub fn kind(&self) -> u16 {
        u16::from_be_bytes(self.kind)
    }

    /// Message kind as enum. `None` if unrecognized.
    #[must_use]
    pub fn kind_enum(&self) -> Option<MessageKind> {
        MessageKind::from_u16(self.kind())
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u16 {
        u16::from_be_bytes(self.payload_size)
    }

    /// Set payload size.
    pub fn set_payload_size(&mut self, size: u16) {
        self.payload_size = size.to_be_bytes();
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for MessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHeader")
            .field("magic", &format!("{:#06x}", self.magic()))
            .field("version", &self.version())
            .field("kind", &format!("{:#06x}", self.kind()))
            .field("payload_size", &self.payload_size())
            .finish_non_exhaustive()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for MessageHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for MessageHeader {}
