//! pgrstream CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use pgrstream::{StreamConfig, StreamError, StreamReader, StreamWriter};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("pgrstream v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: pgrstream <command> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  info <stream>                       Show files, frame counts and camera");
        eprintln!("  frames <stream>                     List every frame");
        eprintln!("  copy <stream> <new-base> [--config <toml>]");
        eprintln!("                                      Re-mux into a new stream");
        eprintln!();
        eprintln!("<stream> is a base name or the name of any file of the stream.");
        process::exit(1);
    }

    let command = args[1].as_str();
    let stream = PathBuf::from(&args[2]);

    let result = match command {
        "info" => show_info(&stream),
        "frames" => list_frames(&stream),
        "copy" => match parse_copy_args(&args[3..]) {
            Ok((target, config)) => copy_stream(&stream, &target, config),
            Err(e) => Err(e),
        },
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'pgrstream' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn parse_copy_args(args: &[String]) -> Result<(PathBuf, StreamConfig)> {
    let Some(target) = args.first() else {
        bail!("Usage: pgrstream copy <stream> <new-base> [--config <toml>]");
    };

    let config = match args.get(1..) {
        Some([flag, path]) if flag == "--config" => StreamConfig::from_file(Path::new(path))
            .with_context(|| format!("loading {path}"))?,
        Some([]) | None => StreamConfig::default(),
        Some(_) => bail!("Unexpected arguments after {target}"),
    };

    Ok((PathBuf::from(target), config))
}

fn open(stream: &Path) -> Result<StreamReader> {
    StreamReader::open_path(stream).with_context(|| format!("opening {}", stream.display()))
}

fn show_info(stream: &Path) -> Result<()> {
    let mut reader = open(stream)?;
    let camera = reader.camera_info().clone();

    println!("Stream:       {}", reader.base_name().display());
    println!("Camera:       base {} head {}", camera.serial_base, camera.serial_head);
    println!("Calibration:  {} bytes", camera.calibration.len());
    println!("Frame rate:   {}", reader.frame_rate());
    println!("Frames:       {}", reader.total_frames());
    println!();

    let indexed = StreamConfig::default().indexed_frames();
    for span in reader.files() {
        let note = if span.frame_count > indexed {
            ", tail not indexed"
        } else {
            ""
        };
        println!(
            "  file {:06}: frames {}..{} ({} frames{note})",
            span.file_index,
            span.first_frame,
            span.first_frame + span.frame_count,
            span.frame_count
        );
    }

    if reader.total_frames() > 0 {
        let first = reader.frame_time(0)?;
        let last = reader.frame_time(reader.total_frames() - 1)?;
        println!();
        println!("First frame:  {first} ms");
        println!("Last frame:   {last} ms");
        println!("Duration:     {} ms", last.saturating_sub(first));
    }

    Ok(())
}

fn list_frames(stream: &Path) -> Result<()> {
    let mut reader = open(stream)?;

    println!("{:>8} {:>10} {:>16} {:>10}", "frame", "sequence", "time (ms)", "bytes");
    loop {
        let number = reader.current_frame();
        let frame = match reader.read_next_frame() {
            Ok(frame) => frame,
            Err(StreamError::EndOfStream) => break,
            Err(e) => return Err(e).with_context(|| format!("reading frame {number}")),
        };

        let info = frame.info();
        println!(
            "{number:>8} {:>10} {:>16} {:>10}",
            info.sequence_id,
            info.timestamp_ms(),
            frame.len()
        );
    }

    Ok(())
}

fn copy_stream(stream: &Path, target: &Path, config: StreamConfig) -> Result<()> {
    let mut reader = open(stream)?;

    let mut writer = StreamWriter::new(config);
    writer
        .open(target, reader.camera_info().clone(), 0)
        .with_context(|| format!("creating {}", target.display()))?;

    loop {
        let frame = match reader.read_next_frame() {
            Ok(frame) => frame,
            Err(StreamError::EndOfStream) => break,
            Err(e) => return Err(e).context("reading source stream"),
        };
        writer
            .write_frame(frame.as_bytes())
            .context("writing target stream")?;
    }

    writer.close().context("finalizing target stream")?;

    println!(
        "Copied {} frames ({:.1} MB) into {} file(s)",
        writer.frames_count(),
        writer.megabytes_written(),
        writer.file_index() + 1
    );
    Ok(())
}
