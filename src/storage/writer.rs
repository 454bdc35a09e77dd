//! Stream writer

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::format::{
    data_offset, image_count_position, table_entry_position, CameraInfo, StreamHeader,
    STREAM_SIGNATURE,
};
use super::index::OffsetIndex;
use super::naming::{pgr_filename, MAX_FILE_INDEX};
use crate::{Result, StreamConfig, StreamError};

/// Writer for multi-file streams
///
/// Frames go to `<base>-NNNNNN.pgr`; when the next frame would push the
/// file to the configured size limit the file is finalized and the next
/// index is started. At most one file is open at a time.
pub struct StreamWriter {
    config: StreamConfig,
    camera: CameraInfo,
    base_name: PathBuf,
    file_index: u32,
    container: Option<WriteContainer>,
    total_frames: u64,
    megabytes: f64,
}

/// The file currently being written
struct WriteContainer {
    file: BufWriter<File>,
    position: u64,
    frame_count: u32,
    index: OffsetIndex,
}

impl StreamWriter {
    /// Create a closed writer
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            camera: CameraInfo::default(),
            base_name: PathBuf::new(),
            file_index: 0,
            container: None,
            total_frames: 0,
            megabytes: 0.0,
        }
    }

    /// Create a writer with default config and open `base` at `file_index`
    ///
    /// # Errors
    ///
    /// Returns error if the first file cannot be created
    pub fn create(base: impl AsRef<Path>, camera: CameraInfo, file_index: u32) -> Result<Self> {
        let mut writer = Self::new(StreamConfig::default());
        writer.open(base, camera, file_index)?;
        Ok(writer)
    }

    /// Start a new stream
    ///
    /// # Errors
    ///
    /// Returns error if a file is already open or the first file cannot be
    /// created
    pub fn open(
        &mut self,
        base: impl AsRef<Path>,
        camera: CameraInfo,
        file_index: u32,
    ) -> Result<()> {
        if self.container.is_some() {
            return Err(StreamError::AlreadyOpen);
        }

        self.config.validate()?;
        self.total_frames = 0;
        self.megabytes = 0.0;
        self.camera = camera;
        self.open_file(base.as_ref().to_path_buf(), file_index)
    }

    fn open_file(&mut self, base: PathBuf, file_index: u32) -> Result<()> {
        if self.container.is_some() {
            return Err(StreamError::AlreadyOpen);
        }

        if file_index > MAX_FILE_INDEX {
            return Err(StreamError::InvalidFileName(format!(
                "{}: file index {file_index} exceeds {MAX_FILE_INDEX}",
                base.display()
            )));
        }

        let calibration_len = self.calibration_len()?;
        let data_start = data_offset(calibration_len);
        if data_start >= self.config.size_limit {
            return Err(StreamError::DataTooLarge {
                size: data_start,
                limit: self.config.size_limit,
            });
        }

        let path = pgr_filename(&base, file_index);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut file = BufWriter::new(file);

        let header = StreamHeader::new(
            &self.camera,
            self.config.assumed_frame_rate,
            // below size_limit, which never exceeds LIMIT_2GB
            data_start as u32,
            self.config.index_increment,
        );

        file.write_all(&STREAM_SIGNATURE)?;
        file.write_all(&header.to_le_bytes())?;
        file.write_all(&self.camera.calibration)?;

        // Frames start past a gap up to the aligned data offset
        file.seek(SeekFrom::Start(data_start))?;

        info!("Created stream file {}", path.display());

        self.base_name = base;
        self.file_index = file_index;
        self.container = Some(WriteContainer {
            file,
            position: data_start,
            frame_count: 0,
            index: OffsetIndex::new(self.config.index_increment),
        });

        Ok(())
    }

    fn calibration_len(&self) -> Result<u32> {
        u32::try_from(self.camera.calibration.len()).map_err(|_| StreamError::DataTooLarge {
            size: self.camera.calibration.len() as u64,
            limit: u64::from(u32::MAX),
        })
    }

    /// Append one frame record
    ///
    /// The record is written verbatim. A frame is never split across files.
    ///
    /// # Errors
    ///
    /// Returns error if no file is open, the frame cannot fit into a file,
    /// rolling over to the next file fails or the write fails
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let size = frame.len() as u64;
        let limit = self.config.size_limit;

        let container = self.container.as_ref().ok_or(StreamError::NotOpen)?;
        if container.position + size >= limit {
            // would not fit into a fresh file either
            let data_start = data_offset(self.calibration_len()?);
            if data_start + size >= limit {
                return Err(StreamError::DataTooLarge {
                    size,
                    limit: limit - data_start,
                });
            }
            self.start_next_file()?;
        }

        let sync_interval = self.config.sync_interval;
        let container = self.container.as_mut().ok_or(StreamError::NotOpen)?;

        // position < size_limit <= LIMIT_2GB
        let offset = u32::try_from(container.position).map_err(|_| StreamError::DataTooLarge {
            size: container.position,
            limit,
        })?;
        container.index.record(container.frame_count, offset);

        container.file.write_all(frame)?;
        container.position += size;

        if container.frame_count % sync_interval == sync_interval - 1 {
            container.file.flush()?;
            container.file.get_ref().sync_data()?;
        }

        container.frame_count += 1;
        self.total_frames += 1;
        self.megabytes += size as f64 / (1024.0 * 1024.0);

        Ok(())
    }

    fn start_next_file(&mut self) -> Result<()> {
        let next = self.file_index + 1;
        info!("Starting new stream file: index {next}");

        self.close()?;
        self.open_file(self.base_name.clone(), next)
    }

    /// Finalize and close the current file
    ///
    /// The handle is released even when finalizing fails.
    ///
    /// # Errors
    ///
    /// Returns error if no file is open or the header cannot be updated
    pub fn close(&mut self) -> Result<()> {
        let container = self.container.take().ok_or(StreamError::NotOpen)?;
        let frame_count = container.frame_count;
        container.finalize()?;

        debug!(
            "Closed stream file {} with {frame_count} frames",
            pgr_filename(&self.base_name, self.file_index).display()
        );
        Ok(())
    }

    /// Whether a file is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.container.is_some()
    }

    /// Frames written since [`StreamWriter::open`], across all files
    #[must_use]
    pub fn frames_count(&self) -> u64 {
        self.total_frames
    }

    /// Megabytes written since [`StreamWriter::open`]
    #[must_use]
    pub fn megabytes_written(&self) -> f64 {
        self.megabytes
    }

    /// Index of the file currently (or last) written
    #[must_use]
    pub fn file_index(&self) -> u32 {
        self.file_index
    }
}

impl WriteContainer {
    /// Patch counts and the offset table into the header
    fn finalize(mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(image_count_position()))?;
        self.file.write_all(&self.frame_count.to_le_bytes())?;
        self.file.write_all(&(self.index.len() as u32).to_le_bytes())?;

        for (key, offset) in self.index.entries() {
            self.file.seek(SeekFrom::Start(table_entry_position(key)))?;
            self.file.write_all(&offset.to_le_bytes())?;
        }

        self.file.flush()?;
        Ok(())
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if self.container.is_some() {
            if let Err(e) = self.close() {
                warn!("Failed to finalize stream file on drop: {e}");
            }
        }
    }
}
