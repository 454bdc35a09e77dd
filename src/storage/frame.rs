//! Frame records
//!
//! A record is a big-endian [`FrameHeader`], a big-endian [`FrameInfo`] and
//! the compressed payload. Only the two fixed structs are byte swapped; the
//! payload is opaque.

use bytemuck::{bytes_of, pod_read_unaligned, Pod, Zeroable};

use super::format::map_words;
use crate::{Result, StreamError};

/// Frame header size
pub const FRAME_HEADER_SIZE: usize = 32;

/// Frame info size
pub const FRAME_INFO_SIZE: usize = 96;

/// Fixed part of every record
pub const FRAME_PREFIX_SIZE: usize = FRAME_HEADER_SIZE + FRAME_INFO_SIZE;

/// Frame header, host order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FrameHeader {
    /// Total record length, header included
    pub data_size: u32,

    /// Reserved
    pub reserved: [u32; 7],
}

static_assertions::const_assert_eq!(std::mem::size_of::<FrameHeader>(), FRAME_HEADER_SIZE);

/// Frame metadata, host order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FrameInfo {
    /// Record fingerprint
    pub fingerprint: u32,
    /// Record version
    pub version: u32,
    /// Capture time, whole seconds
    pub time_seconds: u32,
    /// Capture time, microseconds part
    pub time_microseconds: u32,
    /// Camera sequence number
    pub sequence_id: u32,
    /// Refresh rate
    pub refresh_rate: u32,
    /// Per-sensor gain adjustment
    pub gain_adjust: [u32; 6],
    /// White balance
    pub white_balance: u32,
    /// Bayer gain
    pub bayer_gain: u32,
    /// Bayer map
    pub bayer_map: u32,
    /// Brightness
    pub brightness: u32,
    /// Gamma
    pub gamma: u32,
    /// Camera serial number
    pub serial_num: u32,
    /// Per-sensor shutter
    pub shutter: [u32; 6],
}

static_assertions::const_assert_eq!(std::mem::size_of::<FrameInfo>(), FRAME_INFO_SIZE);

impl FrameHeader {
    /// Decode from on-disk bytes
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let mut header: Self = pod_read_unaligned(bytes);
        map_words(&mut header, u32::from_be);
        header
    }

    /// Encode to on-disk bytes
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut header = *self;
        map_words(&mut header, u32::to_be);
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes.copy_from_slice(bytes_of(&header));
        bytes
    }

    /// Bytes following the header within the record
    ///
    /// # Errors
    ///
    /// Returns error if the declared size cannot hold the fixed prefix
    pub fn remaining_size(&self) -> Result<u32> {
        if (self.data_size as usize) < FRAME_PREFIX_SIZE {
            return Err(StreamError::InvalidFormat(format!(
                "Frame record of {} bytes is shorter than its {FRAME_PREFIX_SIZE} byte prefix",
                self.data_size
            )));
        }
        Ok(self.data_size - FRAME_HEADER_SIZE as u32)
    }
}

impl FrameInfo {
    /// Decode from on-disk bytes
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8; FRAME_INFO_SIZE]) -> Self {
        let mut info: Self = pod_read_unaligned(bytes);
        map_words(&mut info, u32::from_be);
        info
    }

    /// Encode to on-disk bytes
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; FRAME_INFO_SIZE] {
        let mut info = *self;
        map_words(&mut info, u32::to_be);
        let mut bytes = [0u8; FRAME_INFO_SIZE];
        bytes.copy_from_slice(bytes_of(&info));
        bytes
    }

    /// Capture time in milliseconds
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        u64::from(self.time_seconds) * 1000 + u64::from(self.time_microseconds) / 1000
    }
}

/// One complete frame record in on-disk byte order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    /// Build a record from metadata and a compressed payload
    ///
    /// # Errors
    ///
    /// Returns error if the record length does not fit in 32 bits
    pub fn encode(info: &FrameInfo, payload: &[u8]) -> Result<Self> {
        let size = FRAME_PREFIX_SIZE + payload.len();
        let data_size = u32::try_from(size).map_err(|_| StreamError::DataTooLarge {
            size: size as u64,
            limit: u64::from(u32::MAX),
        })?;

        let header = FrameHeader {
            data_size,
            reserved: [0; 7],
        };

        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(&header.to_be_bytes());
        data.extend_from_slice(&info.to_be_bytes());
        data.extend_from_slice(payload);

        Ok(Self { data })
    }

    /// Wrap a record produced elsewhere
    ///
    /// # Errors
    ///
    /// Returns error if the declared record length does not match the buffer
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < FRAME_PREFIX_SIZE {
            return Err(StreamError::InvalidFormat(format!(
                "Frame record of {} bytes is shorter than its {FRAME_PREFIX_SIZE} byte prefix",
                data.len()
            )));
        }

        let frame = Self { data };
        let declared = frame.header().data_size as usize;
        if declared != frame.data.len() {
            return Err(StreamError::InvalidFormat(format!(
                "Frame record declares {declared} bytes but holds {}",
                frame.data.len()
            )));
        }

        Ok(frame)
    }

    /// Record read straight from a container; the prefix was already checked
    pub(crate) fn from_raw(data: Vec<u8>) -> Self {
        debug_assert!(data.len() >= FRAME_PREFIX_SIZE);
        Self { data }
    }

    /// Decoded frame header
    #[must_use]
    pub fn header(&self) -> FrameHeader {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&self.data[..FRAME_HEADER_SIZE]);
        FrameHeader::from_be_bytes(&raw)
    }

    /// Decoded frame metadata
    #[must_use]
    pub fn info(&self) -> FrameInfo {
        let mut raw = [0u8; FRAME_INFO_SIZE];
        raw.copy_from_slice(&self.data[FRAME_HEADER_SIZE..FRAME_PREFIX_SIZE]);
        FrameInfo::from_be_bytes(&raw)
    }

    /// Compressed image data
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[FRAME_PREFIX_SIZE..]
    }

    /// Capture time in milliseconds
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.info().timestamp_ms()
    }

    /// Whole record
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the record buffer
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Record length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Records always hold at least their fixed prefix
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
