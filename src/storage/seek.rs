//! Random access within a stream

use std::io::{Seek, SeekFrom};

use tracing::{debug, warn};

use super::frame::{FrameHeader, FrameInfo, FRAME_HEADER_SIZE, FRAME_INFO_SIZE};
use super::naming::pgr_filename;
use super::reader::{read_record, FileSpan, ReadContainer, StreamReader};
use crate::{Result, StreamError};

impl StreamReader {
    /// Move the cursor to global frame `frame`
    ///
    /// Switches files if needed, then jumps to the nearest index entry and
    /// walks the remaining records header by header. If the walk hits a
    /// damaged record the file is rewound to its first frame and the cursor
    /// is reset to 0.
    ///
    /// # Errors
    ///
    /// Returns error if no file is open, `frame` is out of range, the target
    /// file cannot be opened or the walk fails
    pub fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        let in_current = match &self.container {
            Some(container) => container.span.contains(frame),
            None => return Err(StreamError::NotOpen),
        };

        if frame >= self.total_frames {
            return Err(StreamError::FrameOutOfRange {
                frame,
                total: self.total_frames,
            });
        }

        if !in_current {
            let span = self.span_for(frame)?;
            debug!("Switching to file {} for frame {frame}", span.file_index);

            self.container = None;
            let path = pgr_filename(&self.base_name, span.file_index);
            self.container = Some(ReadContainer::open(&path, span.file_index, span.first_frame)?);
        }

        self.current_frame = frame;
        let container = self.container.as_mut().ok_or(StreamError::NotOpen)?;

        let local = frame - container.span.first_frame;
        let (start, skip) = match container.index.lookup(local) {
            Some((offset, indexed_frame)) => (u64::from(offset), local - indexed_frame),
            None => (container.data_offset, local),
        };

        if let Err(e) = container.skip_frames(start, skip) {
            warn!("Seek to frame {frame} failed, rewinding to first frame: {e}");
            if let Err(rewind) = container.file.seek(SeekFrom::Start(container.data_offset)) {
                warn!("Rewind failed: {rewind}");
            }
            self.current_frame = 0;
            return Err(e);
        }

        Ok(())
    }

    /// Move the cursor to the frame captured about `milliseconds` into the
    /// stream
    ///
    /// Assumes a constant frame rate; actual frame timestamps are not
    /// consulted.
    ///
    /// # Errors
    ///
    /// See [`StreamReader::seek_to_frame`]
    pub fn seek_to_time(&mut self, milliseconds: u64) -> Result<()> {
        let frame = milliseconds
            .checked_mul(u64::from(self.config.assumed_frame_rate))
            .map(|scaled| scaled / 1000)
            .ok_or(StreamError::FrameOutOfRange {
                frame: u64::MAX,
                total: self.total_frames,
            })?;
        self.seek_to_frame(frame)
    }

    /// Capture time of frame `frame` in milliseconds
    ///
    /// Leaves the cursor at `frame` without consuming it.
    ///
    /// # Errors
    ///
    /// Returns error if seeking to the frame or reading its metadata fails
    pub fn frame_time(&mut self, frame: u64) -> Result<u64> {
        let positioned = frame == self.current_frame
            && self
                .container
                .as_ref()
                .is_some_and(|container| container.span.contains(frame));
        if !positioned {
            self.seek_to_frame(frame)?;
        }

        let container = self.container.as_mut().ok_or(StreamError::NotOpen)?;
        let position = container.file.stream_position()?;

        let mut raw_header = [0u8; FRAME_HEADER_SIZE];
        let mut raw_info = [0u8; FRAME_INFO_SIZE];
        let read = read_record(&mut container.file, &mut raw_header, "frame header")
            .and_then(|()| read_record(&mut container.file, &mut raw_info, "frame info"));

        container.file.seek(SeekFrom::Start(position))?;
        read?;

        Ok(FrameInfo::from_be_bytes(&raw_info).timestamp_ms())
    }

    /// File holding global frame `frame`
    fn span_for(&self, frame: u64) -> Result<FileSpan> {
        let following = self.files.partition_point(|span| span.first_frame <= frame);
        following
            .checked_sub(1)
            .map(|i| self.files[i])
            .ok_or(StreamError::FrameOutOfRange {
                frame,
                total: self.total_frames,
            })
    }
}

impl ReadContainer {
    /// Position at `start` and step over `count` records
    fn skip_frames(&mut self, start: u64, count: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(start))?;

        for _ in 0..count {
            let mut raw_header = [0u8; FRAME_HEADER_SIZE];
            read_record(&mut self.file, &mut raw_header, "frame header")?;
            let remaining = FrameHeader::from_be_bytes(&raw_header).remaining_size()?;
            self.file.seek_relative(i64::from(remaining))?;
        }

        Ok(())
    }
}
