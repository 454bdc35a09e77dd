//! Stream reader

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use super::format::{CameraInfo, StreamHeader, HEADER_SIZE, SIGNATURE_SIZE, STREAM_SIGNATURE};
use super::frame::{Frame, FrameHeader, FrameInfo, FRAME_HEADER_SIZE, FRAME_INFO_SIZE};
use super::index::OffsetIndex;
use super::naming::{pgr_filename, resolve_stream, MAX_FILE_INDEX};
use crate::{Result, StreamConfig, StreamError};

/// Frame range covered by one file of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpan {
    /// Index in the file name
    pub file_index: u32,
    /// Global number of the first frame in the file
    pub first_frame: u64,
    /// Frames stored in the file
    pub frame_count: u64,
}

impl FileSpan {
    /// Whether global frame `frame` is stored in this file
    #[must_use]
    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.first_frame && frame < self.first_frame + self.frame_count
    }
}

/// Reader for multi-file streams
///
/// Opening probes `<base>-NNNNNN.pgr` files with increasing index until one
/// fails to open; frame numbers run contiguously across all of them. Only
/// one file is held open at a time.
pub struct StreamReader {
    pub(super) config: StreamConfig,
    pub(super) base_name: PathBuf,
    pub(super) files: Vec<FileSpan>,
    pub(super) total_frames: u64,
    pub(super) current_frame: u64,
    pub(super) container: Option<ReadContainer>,
    camera: CameraInfo,
    frame_rate: u32,
}

/// The file currently being read
pub(super) struct ReadContainer {
    pub(super) file: BufReader<File>,
    pub(super) span: FileSpan,
    pub(super) data_offset: u64,
    pub(super) index: OffsetIndex,
    file_len: u64,
    header: StreamHeader,
    calibration: Vec<u8>,
}

impl StreamReader {
    /// Create a closed reader
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            base_name: PathBuf::new(),
            files: Vec::new(),
            total_frames: 0,
            current_frame: 0,
            container: None,
            camera: CameraInfo::default(),
            frame_rate: 0,
        }
    }

    /// Open a stream with default config
    ///
    /// # Errors
    ///
    /// Returns error if no file of the stream can be opened
    pub fn open_path(name: impl AsRef<Path>) -> Result<Self> {
        let mut reader = Self::new(StreamConfig::default());
        reader.open(name, 0)?;
        Ok(reader)
    }

    /// Open the stream `name` starting at file `file_index`
    ///
    /// `name` may also be the full name of one of the stream's files, in
    /// which case base name and index are taken from it. The reader is left
    /// at frame 0.
    ///
    /// # Errors
    ///
    /// Returns error if a file is already open or not even the first file
    /// of the stream can be opened
    pub fn open(&mut self, name: impl AsRef<Path>, file_index: u32) -> Result<()> {
        if self.container.is_some() {
            return Err(StreamError::AlreadyOpen);
        }

        self.config.validate()?;
        let (base, first_index) = resolve_stream(name.as_ref(), file_index)?;

        self.base_name = base;
        self.files.clear();
        self.total_frames = 0;
        self.current_frame = 0;

        let mut file_index = first_index;
        loop {
            let path = pgr_filename(&self.base_name, file_index);
            match ReadContainer::open(&path, file_index, self.total_frames) {
                Ok(container) => {
                    debug!(
                        "Probed {} - {} frames",
                        path.display(),
                        container.span.frame_count
                    );
                    if self.files.is_empty() {
                        self.camera = container.camera_info();
                        self.frame_rate = container.header.frame_rate;
                    }
                    self.files.push(container.span);
                    self.total_frames += container.span.frame_count;
                }
                Err(e) if self.files.is_empty() => return Err(e),
                Err(e) => {
                    debug!("Stream ends before {}: {e}", path.display());
                    break;
                }
            }

            if file_index == MAX_FILE_INDEX {
                break;
            }
            file_index += 1;
        }

        let first = pgr_filename(&self.base_name, first_index);
        self.container = Some(ReadContainer::open(&first, first_index, 0)?);

        info!(
            "Opened stream {}: {} files, {} frames",
            self.base_name.display(),
            self.files.len(),
            self.total_frames
        );
        Ok(())
    }

    /// Read the frame at the cursor and advance it
    ///
    /// Crosses into the next file transparently. The returned record keeps
    /// its on-disk byte order.
    ///
    /// # Errors
    ///
    /// Returns error if no file is open, the end of the stream is reached or
    /// the record cannot be read
    pub fn read_next_frame(&mut self) -> Result<Frame> {
        let in_current = match &self.container {
            Some(container) => container.span.contains(self.current_frame),
            None => return Err(StreamError::NotOpen),
        };

        if self.current_frame >= self.total_frames {
            return Err(StreamError::EndOfStream);
        }

        if !in_current {
            debug!("Frame {} is in another file", self.current_frame);
            self.seek_to_frame(self.current_frame)?;
        }

        let container = self.container.as_mut().ok_or(StreamError::NotOpen)?;

        let mut raw_header = [0u8; FRAME_HEADER_SIZE];
        let mut raw_info = [0u8; FRAME_INFO_SIZE];
        read_record(&mut container.file, &mut raw_header, "frame header")?;
        read_record(&mut container.file, &mut raw_info, "frame info")?;

        let header = FrameHeader::from_be_bytes(&raw_header);
        let info = FrameInfo::from_be_bytes(&raw_info);
        header.remaining_size()?;
        if u64::from(header.data_size) > container.file_len {
            return Err(StreamError::InvalidFormat(format!(
                "Frame {} claims {} bytes, file holds {}",
                self.current_frame, header.data_size, container.file_len
            )));
        }

        let size = header.data_size as usize;
        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(&raw_header);
        data.extend_from_slice(&raw_info);
        data.resize(size, 0);
        read_record(
            &mut container.file,
            &mut data[FRAME_HEADER_SIZE + FRAME_INFO_SIZE..],
            "frame payload",
        )?;

        trace!(
            "Frame {:04} seq {} time {}.{:03}",
            self.current_frame,
            info.sequence_id,
            info.time_seconds,
            info.time_microseconds / 1000
        );

        self.current_frame += 1;
        Ok(Frame::from_raw(data))
    }

    /// Close the open file
    ///
    /// # Errors
    ///
    /// Returns error if no file is open
    pub fn close(&mut self) -> Result<()> {
        self.container.take().ok_or(StreamError::NotOpen)?;
        Ok(())
    }

    /// Whether a file is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.container.is_some()
    }

    /// Frames in the whole stream
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Files making up the stream
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Frame ranges of all files, in order
    #[must_use]
    pub fn files(&self) -> &[FileSpan] {
        &self.files
    }

    /// Frame the next [`StreamReader::read_next_frame`] returns
    #[must_use]
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Camera descriptor from the first file
    #[must_use]
    pub fn camera_info(&self) -> &CameraInfo {
        &self.camera
    }

    /// Frame rate recorded in the first file
    #[must_use]
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Base name of the stream
    #[must_use]
    pub fn base_name(&self) -> &Path {
        &self.base_name
    }
}

impl ReadContainer {
    /// Open one file and position it at its first frame
    ///
    /// `first_frame` is the global number of the file's first frame.
    pub(super) fn open(path: &Path, file_index: u32, first_frame: u64) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::new(file);

        let mut signature = [0u8; SIGNATURE_SIZE];
        read_record(&mut file, &mut signature, "signature")?;
        if signature != STREAM_SIGNATURE {
            return Err(StreamError::InvalidFormat(format!(
                "Invalid signature in {}: {:?}",
                path.display(),
                String::from_utf8_lossy(&signature)
            )));
        }

        let mut raw_header = [0u8; HEADER_SIZE];
        read_record(&mut file, &mut raw_header, "stream header")?;
        let header = StreamHeader::from_le_bytes(&raw_header);
        super::validate_header(&header)?;

        let calibration_end =
            (SIGNATURE_SIZE + HEADER_SIZE) as u64 + u64::from(header.config_data_size);
        if calibration_end > file_len {
            return Err(StreamError::InvalidFormat(format!(
                "Calibration data of {} bytes runs past the end of {}",
                header.config_data_size,
                path.display()
            )));
        }

        let mut calibration = vec![0u8; header.config_data_size as usize];
        read_record(&mut file, &mut calibration, "calibration data")?;

        let index = OffsetIndex::from_disk_table(
            &header.offset_table,
            header.key_index_count,
            header.increment,
        )?;

        trace!(
            "{}: {} frames, increment {}, offsets {:08x?}",
            path.display(),
            header.image_count,
            header.increment,
            index.entries().map(|(_, offset)| offset).collect::<Vec<_>>()
        );

        let data_offset = u64::from(header.stream_data_offset);
        file.seek(SeekFrom::Start(data_offset))?;

        Ok(Self {
            file,
            span: FileSpan {
                file_index,
                first_frame,
                frame_count: u64::from(header.image_count),
            },
            data_offset,
            index,
            file_len,
            header,
            calibration,
        })
    }

    fn camera_info(&self) -> CameraInfo {
        CameraInfo {
            serial_base: self.header.serial_base,
            serial_head: self.header.serial_head,
            calibration: self.calibration.clone(),
        }
    }
}

/// `read_exact` that reports a short read as a truncated container
pub(super) fn read_record(reader: &mut impl Read, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            StreamError::InvalidFormat(format!("Truncated {what}"))
        } else {
            StreamError::Io(e)
        }
    })
}
