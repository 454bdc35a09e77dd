//! Stream container storage
//!
//! File layout:
//!
//! | Offset                   | Content                          |
//! |--------------------------|----------------------------------|
//! | 0                        | 16 byte signature                |
//! | 16                       | [`StreamHeader`], little-endian  |
//! | 16 + [`HEADER_SIZE`]     | calibration blob                 |
//! | data offset (512 aligned)| frame records, big-endian prefix |

mod format;
mod frame;
mod index;
mod naming;
mod reader;
mod seek;
mod writer;

pub use format::{
    data_offset, disk_slot, table_entry_position, CameraInfo, StreamHeader, DATA_ALIGNMENT,
    DATA_FORMAT_COLOR_SEP_SEQUENTIAL_JPEG, HEADER_SIZE, INDEX_CAPACITY, LIMIT_2GB,
    RESOLUTION_1024X768, SIGNATURE_SIZE, STIPPLED_BGGR, STREAM_SIGNATURE, STREAM_VERSION,
};
pub use frame::{
    Frame, FrameHeader, FrameInfo, FRAME_HEADER_SIZE, FRAME_INFO_SIZE, FRAME_PREFIX_SIZE,
};
pub use index::OffsetIndex;
pub use naming::{parse_base_name_and_index, pgr_filename, resolve_stream, MAX_FILE_INDEX};
pub use reader::{FileSpan, StreamReader};
pub use writer::StreamWriter;

use crate::Result;

/// Validate the profile and layout fields of a stream header
///
/// # Errors
///
/// Returns error if the header describes an unsupported profile or an
/// impossible layout
pub fn validate_header(header: &StreamHeader) -> Result<()> {
    if !header.is_supported_profile() {
        return Err(crate::StreamError::UnsupportedProfile {
            data_format: header.data_format,
            resolution: header.resolution,
            stippled_format: header.stippled_format,
        });
    }

    let data_start = (SIGNATURE_SIZE + HEADER_SIZE) as u64 + u64::from(header.config_data_size);
    if u64::from(header.stream_data_offset) < data_start {
        return Err(crate::StreamError::InvalidFormat(format!(
            "Stream data offset {:#x} overlaps header and calibration ending at {data_start:#x}",
            header.stream_data_offset
        )));
    }

    Ok(())
}
