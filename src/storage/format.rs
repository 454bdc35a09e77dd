//! Binary format structures

use bytemuck::{bytes_of, bytes_of_mut, pod_read_unaligned, Pod, Zeroable};

/// Signature at the very start of every container file
pub const STREAM_SIGNATURE: [u8; SIGNATURE_SIZE] = *b"PGRLADYBUGSTREAM";

/// Signature size
pub const SIGNATURE_SIZE: usize = 16;

/// Stream format version written into new files
pub const STREAM_VERSION: u32 = 4;

/// Stream header size (follows the signature)
pub const HEADER_SIZE: usize = 3056;

/// Number of slots in the sparse offset table
pub const INDEX_CAPACITY: usize = 512;

/// Files never grow to this size (2 GiB - 1)
pub const LIMIT_2GB: u64 = 0x7fff_ffff;

/// Frame data starts on a boundary of this many bytes
pub const DATA_ALIGNMENT: u32 = 0x200;

/// Colour-separated sequential JPEG
pub const DATA_FORMAT_COLOR_SEP_SEQUENTIAL_JPEG: u32 = 8;

/// 1024x768 sensor resolution
pub const RESOLUTION_1024X768: u32 = 4;

/// BGGR Bayer pattern
pub const STIPPLED_BGGR: u32 = 0;

/// Header-relative offset of the image count field
pub const IMAGE_COUNT_OFFSET: usize = 0x88;

/// Header-relative offset of the key index count field
pub const KEY_INDEX_COUNT_OFFSET: usize = 0x8c;

/// Header-relative offset of the offset table
pub const OFFSET_TABLE_OFFSET: usize = 0x3f0;

/// Stream header (3056 bytes)
///
/// Every field is a 32-bit word stored little-endian, the native order of
/// the camera SDK that defined the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct StreamHeader {
    /// Format version
    pub version: u32,

    /// Frames per second
    pub frame_rate: u32,

    /// Serial number of the camera base unit
    pub serial_base: u32,

    /// Serial number of the camera head
    pub serial_head: u32,

    /// Reserved
    pub reserved: [u32; 25],

    /// Padding block size (unused for compressed data)
    pub padding_size: u32,

    /// Image data format tag
    pub data_format: u32,

    /// Sensor resolution tag
    pub resolution: u32,

    /// Colour filter pattern tag
    pub stippled_format: u32,

    /// Size of the calibration blob that follows the header
    pub config_data_size: u32,

    /// Number of frames in this file
    pub image_count: u32,

    /// Number of populated offset table slots
    pub key_index_count: u32,

    /// Frames between two offset table entries
    pub increment: u32,

    /// Absolute offset of the first frame
    pub stream_data_offset: u32,

    /// GPS data offset (unused)
    pub gps_data_offset: u32,

    /// GPS data size (unused)
    pub gps_data_size: u32,

    /// Reserved
    pub reserved_space: [u32; 212],

    /// Frame offsets, stored in reverse key order
    pub offset_table: [u32; INDEX_CAPACITY],
}

static_assertions::const_assert_eq!(std::mem::size_of::<StreamHeader>(), HEADER_SIZE);
static_assertions::const_assert_eq!(
    std::mem::offset_of!(StreamHeader, image_count),
    IMAGE_COUNT_OFFSET
);
static_assertions::const_assert_eq!(
    std::mem::offset_of!(StreamHeader, key_index_count),
    KEY_INDEX_COUNT_OFFSET
);
static_assertions::const_assert_eq!(
    std::mem::offset_of!(StreamHeader, offset_table),
    OFFSET_TABLE_OFFSET
);

/// Camera descriptor stored alongside every container file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraInfo {
    /// Serial number of the camera base unit
    pub serial_base: u32,
    /// Serial number of the camera head
    pub serial_head: u32,
    /// Opaque calibration data, copied verbatim
    pub calibration: Vec<u8>,
}

impl StreamHeader {
    /// Build the header of a freshly created file
    ///
    /// Counts are placeholders until the file is closed. The first offset
    /// table entry already points at the data start.
    #[must_use]
    pub fn new(camera: &CameraInfo, frame_rate: u32, data_offset: u32, increment: u32) -> Self {
        let mut header = Self::zeroed();
        header.version = STREAM_VERSION;
        header.frame_rate = frame_rate;
        header.serial_base = camera.serial_base;
        header.serial_head = camera.serial_head;
        header.data_format = DATA_FORMAT_COLOR_SEP_SEQUENTIAL_JPEG;
        header.resolution = RESOLUTION_1024X768;
        header.stippled_format = STIPPLED_BGGR;
        header.config_data_size = camera.calibration.len() as u32;
        header.key_index_count = 1;
        header.increment = increment;
        header.offset_table[disk_slot(0)] = data_offset;
        header.stream_data_offset = data_offset;
        header
    }

    /// Decode a header from its on-disk bytes
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut header: Self = pod_read_unaligned(bytes);
        map_words(&mut header, u32::from_le);
        header
    }

    /// Encode the header to its on-disk bytes
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut header = *self;
        map_words(&mut header, u32::to_le);
        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(bytes_of(&header));
        bytes
    }

    /// Check the single encoding profile this engine handles
    #[must_use]
    pub fn is_supported_profile(&self) -> bool {
        self.data_format == DATA_FORMAT_COLOR_SEP_SEQUENTIAL_JPEG
            && self.resolution == RESOLUTION_1024X768
            && self.stippled_format == STIPPLED_BGGR
    }
}

/// Table slot holding the entry of `key`; keys are stored back to front
#[must_use]
pub const fn disk_slot(key: usize) -> usize {
    INDEX_CAPACITY - 1 - key
}

/// Absolute file position of the offset table entry for `key`
#[must_use]
pub const fn table_entry_position(key: usize) -> u64 {
    (SIGNATURE_SIZE + OFFSET_TABLE_OFFSET + disk_slot(key) * 4) as u64
}

/// Absolute file position of the image count field
#[must_use]
pub const fn image_count_position() -> u64 {
    (SIGNATURE_SIZE + IMAGE_COUNT_OFFSET) as u64
}

/// Offset of the first frame for a calibration blob of `calibration_len`
///
/// Always moves past the next 512 byte boundary, even when the unpadded
/// offset is already aligned, as the SDK does.
#[must_use]
pub const fn data_offset(calibration_len: u32) -> u64 {
    let alignment = DATA_ALIGNMENT as u64;
    let unaligned = (SIGNATURE_SIZE + HEADER_SIZE) as u64 + calibration_len as u64;
    (unaligned & !(alignment - 1)) + alignment
}

/// Apply `convert` to every 32-bit word of `value`
///
/// Only used on structs made purely of `u32` fields, so every word is a
/// numeric field.
pub(crate) fn map_words<T: Pod>(value: &mut T, convert: fn(u32) -> u32) {
    for word in bytes_of_mut(value).chunks_exact_mut(4) {
        let raw = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
        word.copy_from_slice(&convert(raw).to_ne_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<StreamHeader>(), 3056);
        assert_eq!(SIGNATURE_SIZE + KEY_INDEX_COUNT_OFFSET, 16 + 0x8c);
    }

    #[test]
    fn test_disk_slot_is_reversed() {
        assert_eq!(disk_slot(0), 511);
        assert_eq!(disk_slot(1), 510);
        assert_eq!(disk_slot(511), 0);
    }

    #[test]
    fn test_table_entry_position() {
        for key in [0usize, 1, 2, 100, 511] {
            assert_eq!(table_entry_position(key), (16 + 0xbec - key * 4) as u64);
        }
    }

    #[test]
    fn test_data_offset_rounding() {
        // 16 + 3056 = 3072 is already aligned and still moves on
        assert_eq!(data_offset(0), 3584);
        assert_eq!(data_offset(1), 3584);
        assert_eq!(data_offset(511), 3584);
        assert_eq!(data_offset(512), 4096);
        assert_eq!(data_offset(1000) % u64::from(DATA_ALIGNMENT), 0);
    }

    #[test]
    fn test_new_header() {
        let camera = CameraInfo {
            serial_base: 7,
            serial_head: 9,
            calibration: vec![1, 2, 3],
        };
        let header = StreamHeader::new(&camera, 15, 3584, 50);
        assert_eq!(header.version, STREAM_VERSION);
        assert_eq!(header.serial_base, 7);
        assert_eq!(header.serial_head, 9);
        assert_eq!(header.config_data_size, 3);
        assert_eq!(header.image_count, 0);
        assert_eq!(header.key_index_count, 1);
        assert_eq!(header.offset_table[511], 3584);
        assert_eq!(header.gps_data_offset, 0);
        assert!(header.is_supported_profile());
    }

    #[test]
    fn test_header_bytes_are_little_endian() {
        let header = StreamHeader::new(&CameraInfo::default(), 15, 3584, 50);
        let bytes = header.to_le_bytes();

        assert_eq!(&bytes[0..4], &[4, 0, 0, 0]);
        assert_eq!(&bytes[0x90..0x94], &50u32.to_le_bytes());
        let slot = OFFSET_TABLE_OFFSET + disk_slot(0) * 4;
        assert_eq!(&bytes[slot..slot + 4], &3584u32.to_le_bytes());

        assert_eq!(StreamHeader::from_le_bytes(&bytes), header);
    }

    #[test]
    fn test_unsupported_profile() {
        let mut header = StreamHeader::new(&CameraInfo::default(), 15, 3584, 50);
        header.resolution = 3;
        assert!(!header.is_supported_profile());
    }
}
