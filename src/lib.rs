//! pgrstream - reader/writer for PGR spherical camera stream containers
//!
//! A logical stream is a run of `<base>-NNNNNN.pgr` files, each holding a
//! fixed header, an opaque calibration blob and a sequence of frame records
//! addressed through a sparse offset index.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod storage;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use storage::{CameraInfo, FileSpan, Frame, FrameInfo, StreamReader, StreamWriter};
