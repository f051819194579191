//! Batch export of every photo in the session.
//!
//! For each photo in source order: resolve its effective record (committed
//! or default, never the draft), render, encode, and hand the bytes to an
//! [`ExportSink`]. Two sinks exist:
//!
//! | Mode | Sink | Result |
//! |---|---|---|
//! | [`ExportMode::Files`] | [`DirectorySink`] | `<stem>_1080x<height>.<ext>` per photo |
//! | [`ExportMode::Archive`] | `ZipSink` | one `output_1080_<unix-millis>.zip` |
//!
//! Archive support is a compile-time capability (the `archive` feature).
//! [`Capabilities::negotiate`] reports it once at startup; asking for an
//! archive without it degrades to individual files with an
//! [`ExportEvent::Degraded`] notice.
//!
//! ## Failure handling
//!
//! A failed encode is retried once through
//! [`ImageBackend::encode_fallback`]. If that fails too the export stops
//! with [`ExportError::Encode`]; nothing is retried automatically.
//!
//! ## Yielding
//!
//! Every `yield_every` photos the driver emits [`ExportEvent::Progress`],
//! yields the thread and checks the optional cancellation flag.

use crate::imaging::{BackendError, ImageBackend, OUTPUT_WIDTH, OutputFormat, Quality};
use crate::session::Session;
use crate::types::Photo;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding {name} failed: {source}")]
    Encode {
        name: String,
        #[source]
        source: BackendError,
    },
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("No photos to export")]
    NoPhotos,
}

/// What this build can do, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Zip archives can be written.
    pub archive: bool,
}

impl Capabilities {
    pub fn negotiate() -> Self {
        Self {
            archive: cfg!(feature = "archive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// One file per photo.
    Files,
    /// All outputs in one zip archive.
    Archive,
}

/// Settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub quality: Quality,
    /// Photos between progress events and cancellation checks.
    pub yield_every: usize,
    pub out_dir: PathBuf,
}

/// Progress reported while exporting.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Started {
        total: usize,
        mode: ExportMode,
    },
    /// The requested mode is unavailable; continuing with `using`.
    Degraded {
        requested: ExportMode,
        using: ExportMode,
        reason: String,
    },
    /// The primary encoder failed and the fallback path was used.
    EncodeFallback {
        name: String,
        reason: String,
    },
    PhotoExported {
        index: usize,
        total: usize,
        filename: String,
        bytes: usize,
    },
    Progress {
        done: usize,
        total: usize,
    },
    Cancelled {
        done: usize,
        total: usize,
    },
    Finished(ExportSummary),
}

/// Outcome of an export run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub mode: ExportMode,
    pub exported: usize,
    pub fallbacks: usize,
    pub cancelled: bool,
    /// Names of the written entries, in order.
    pub files: Vec<String>,
    /// The archive path in archive mode.
    pub archive: Option<PathBuf>,
}

/// Destination for encoded outputs.
pub trait ExportSink {
    fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError>;

    /// Flush everything. Returns the archive path for archive sinks.
    fn finish(&mut self) -> Result<Option<PathBuf>, ExportError>;

    /// Remove whatever was written so far. A failed export leaves no output.
    fn abort(&mut self);
}

/// Writes each output as its own file in a directory.
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn create(dir: &Path) -> Result<Self, ExportError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }
}

impl ExportSink for DirectorySink {
    fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError> {
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>, ExportError> {
        Ok(None)
    }

    fn abort(&mut self) {
        for path in self.written.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not remove partial output");
            }
        }
    }
}

#[cfg(feature = "archive")]
pub use zip_sink::ZipSink;

#[cfg(feature = "archive")]
mod zip_sink {
    use super::{ExportError, ExportSink};
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// Bundles all outputs into one zip archive.
    pub struct ZipSink {
        path: PathBuf,
        writer: Option<ZipWriter<File>>,
    }

    fn archive_error(e: zip::result::ZipError) -> ExportError {
        ExportError::Archive(e.to_string())
    }

    impl ZipSink {
        pub fn create(path: &Path) -> Result<Self, ExportError> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Ok(Self {
                path: path.to_path_buf(),
                writer: Some(ZipWriter::new(file)),
            })
        }
    }

    impl ExportSink for ZipSink {
        fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<(), ExportError> {
            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| ExportError::Archive("archive already finished".into()))?;
            // Outputs are already compressed images
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file(filename, options).map_err(archive_error)?;
            writer.write_all(bytes)?;
            Ok(())
        }

        fn finish(&mut self) -> Result<Option<PathBuf>, ExportError> {
            if let Some(writer) = self.writer.take() {
                writer.finish().map_err(archive_error)?;
            }
            Ok(Some(self.path.clone()))
        }

        fn abort(&mut self) {
            // Dropping the writer finalizes the file, so remove it afterwards
            drop(self.writer.take());
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove partial archive");
            }
        }
    }
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "photo".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output name for a photo: `<stem>_1080x<height>.<ext>`.
pub fn output_filename(photo: &Photo, canvas_height: u32, format: OutputFormat) -> String {
    format!(
        "{}_{}x{}.{}",
        sanitize_filename(photo.stem()),
        OUTPUT_WIDTH,
        canvas_height,
        format.extension()
    )
}

/// Archive name for an export started at `unix_millis`.
pub fn archive_filename(unix_millis: u128) -> String {
    format!("output_{}_{}.zip", OUTPUT_WIDTH, unix_millis)
}

/// Make `name` unique among `taken` by inserting `-2`, `-3`, ... before the
/// extension.
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot..]),
        None => (name.as_str(), ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn emit(events: &Option<Sender<ExportEvent>>, event: ExportEvent) {
    if let Some(tx) = events {
        // The receiver going away only means nobody is listening
        let _ = tx.send(event);
    }
}

/// Choose the effective mode and open its sink.
fn open_sink(
    options: &ExportOptions,
    capabilities: Capabilities,
    events: &Option<Sender<ExportEvent>>,
) -> Result<(ExportMode, Box<dyn ExportSink>), ExportError> {
    if options.mode == ExportMode::Archive {
        if capabilities.archive
            && let Some(sink) = archive_sink(&options.out_dir)?
        {
            return Ok((ExportMode::Archive, sink));
        }
        tracing::warn!("archive support unavailable, exporting individual files");
        emit(
            events,
            ExportEvent::Degraded {
                requested: ExportMode::Archive,
                using: ExportMode::Files,
                reason: "archive support is not available in this build".into(),
            },
        );
    }
    Ok((
        ExportMode::Files,
        Box::new(DirectorySink::create(&options.out_dir)?),
    ))
}

#[cfg(feature = "archive")]
fn archive_sink(out_dir: &Path) -> Result<Option<Box<dyn ExportSink>>, ExportError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let path = out_dir.join(archive_filename(millis));
    Ok(Some(Box::new(ZipSink::create(&path)?)))
}

#[cfg(not(feature = "archive"))]
fn archive_sink(_out_dir: &Path) -> Result<Option<Box<dyn ExportSink>>, ExportError> {
    Ok(None)
}

/// Encode with the primary path, falling back once.
fn encode_with_fallback(
    backend: &impl ImageBackend,
    bitmap: &image::RgbaImage,
    format: OutputFormat,
    quality: Quality,
    name: &str,
    events: &Option<Sender<ExportEvent>>,
) -> Result<(Vec<u8>, bool), ExportError> {
    match backend.encode(bitmap, format, quality) {
        Ok(bytes) => Ok((bytes, false)),
        Err(primary) => {
            tracing::warn!(%name, error = %primary, "encode failed, trying fallback");
            emit(
                events,
                ExportEvent::EncodeFallback {
                    name: name.to_string(),
                    reason: primary.to_string(),
                },
            );
            backend
                .encode_fallback(bitmap, format, quality)
                .map(|bytes| (bytes, true))
                .map_err(|source| ExportError::Encode {
                    name: name.to_string(),
                    source,
                })
        }
    }
}

/// Export every photo in the session.
///
/// Takes the session by shared reference: nothing can edit it while an
/// export runs.
pub fn export(
    session: &Session,
    backend: &impl ImageBackend,
    capabilities: Capabilities,
    options: &ExportOptions,
    cancel: Option<&AtomicBool>,
    events: Option<Sender<ExportEvent>>,
) -> Result<ExportSummary, ExportError> {
    let photos = session.photos();
    if photos.is_empty() {
        return Err(ExportError::NoPhotos);
    }
    let (mode, mut sink) = open_sink(options, capabilities, &events)?;
    match write_outputs(session, backend, mode, sink.as_mut(), options, cancel, &events) {
        Ok(summary) => {
            emit(&events, ExportEvent::Finished(summary.clone()));
            Ok(summary)
        }
        Err(e) => {
            sink.abort();
            Err(e)
        }
    }
}

/// Render, encode and write every photo, then finish the sink.
fn write_outputs(
    session: &Session,
    backend: &impl ImageBackend,
    mode: ExportMode,
    sink: &mut dyn ExportSink,
    options: &ExportOptions,
    cancel: Option<&AtomicBool>,
    events: &Option<Sender<ExportEvent>>,
) -> Result<ExportSummary, ExportError> {
    let photos = session.photos();
    let total = photos.len();
    emit(events, ExportEvent::Started { total, mode });

    let format = session.options().format;
    let compositor = session.compositor();
    let canvas_height = compositor.geometry().canvas_height;
    let yield_every = options.yield_every.max(1);

    let mut taken = HashSet::new();
    let mut summary = ExportSummary {
        mode,
        exported: 0,
        fallbacks: 0,
        cancelled: false,
        files: Vec::with_capacity(total),
        archive: None,
    };

    for (i, photo) in photos.iter().enumerate() {
        let record = session.effective_record(photo);
        let bitmap = compositor.render(photo, &record);
        let (bytes, fell_back) = encode_with_fallback(
            backend,
            &bitmap,
            format,
            options.quality,
            &photo.name,
            events,
        )?;

        let filename = unique_name(output_filename(photo, canvas_height, format), &mut taken);
        sink.add(&filename, &bytes)?;
        tracing::debug!(%filename, bytes = bytes.len(), "exported");

        summary.exported += 1;
        summary.fallbacks += usize::from(fell_back);
        emit(
            events,
            ExportEvent::PhotoExported {
                index: i + 1,
                total,
                filename: filename.clone(),
                bytes: bytes.len(),
            },
        );
        summary.files.push(filename);

        let done = i + 1;
        if done % yield_every == 0 && done < total {
            emit(events, ExportEvent::Progress { done, total });
            std::thread::yield_now();
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                summary.cancelled = true;
                emit(events, ExportEvent::Cancelled { done, total });
                break;
            }
        }
    }

    summary.archive = sink.finish()?;
    Ok(summary)
}
