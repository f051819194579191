//! Photo discovery and loading.
//!
//! Turns the paths given on the command line into the session's photo set:
//!
//! ```text
//! 1. discover   files are taken as given; directories are walked
//!               recursively for supported extensions, sorted by path
//! 2. identify   PhotoId from file name, byte size and modification time
//! 3. decode     RGBA8 via the backend, subject to the DecodePolicy
//! ```
//!
//! Source order is the order of the inputs, with each directory's files in
//! sorted order at its position. Hidden files and directories are skipped
//! during walks.
//!
//! With [`DecodePolicy::Skip`] an undecodable photo is reported as a
//! [`Status::DecodeSkipped`] and loading continues; with
//! [`DecodePolicy::Abort`] the first failure ends the load.

use crate::config::DecodePolicy;
use crate::imaging::{BackendError, ImageBackend, supported_input_extensions};
use crate::types::{Photo, PhotoId, Status};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("No photos found in the given inputs")]
    NoPhotos,
}

/// Photos decoded from one load, plus what happened along the way.
#[derive(Debug)]
pub struct LoadOutcome {
    pub photos: Vec<Photo>,
    pub statuses: Vec<Status>,
}

/// Expand inputs into an ordered list of photo files.
pub fn discover(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            let walker = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
            for entry in walker {
                let entry = entry?;
                if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(ScanError::NotFound(input.clone()));
        }
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn has_supported_extension(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

/// File name used for identity, output naming and status lines.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Stable identity from the file's name, size and modification time.
pub fn identify(path: &Path) -> Result<PhotoId, ScanError> {
    let meta = fs::metadata(path)?;
    let modified_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Ok(PhotoId::from_file(&display_name(path), meta.len(), modified_ms))
}

/// Decode the given files into a photo set.
pub fn load_photos(
    files: &[PathBuf],
    backend: &impl ImageBackend,
    policy: DecodePolicy,
) -> Result<LoadOutcome, ScanError> {
    let mut photos = Vec::with_capacity(files.len());
    let mut statuses = Vec::new();
    let mut skipped = 0;

    for path in files {
        let name = display_name(path);
        let decoded = identify(path)
            .and_then(|id| {
                backend
                    .decode(path)
                    .map(|bitmap| (id, bitmap))
                    .map_err(|source| ScanError::Decode {
                        path: path.clone(),
                        source,
                    })
            });
        match decoded {
            Ok((id, bitmap)) if bitmap.width() > 0 && bitmap.height() > 0 => {
                tracing::debug!(%name, %id, w = bitmap.width(), h = bitmap.height(), "decoded photo");
                photos.push(Photo {
                    id,
                    name,
                    index: photos.len(),
                    bitmap,
                });
            }
            Ok(_) => {
                let err = ScanError::Decode {
                    path: path.clone(),
                    source: BackendError::DecodeFailed("image has no pixels".into()),
                };
                skip_or_abort(policy, err, name, &mut statuses, &mut skipped)?;
            }
            Err(err) => skip_or_abort(policy, err, name, &mut statuses, &mut skipped)?,
        }
    }

    statuses.push(Status::PhotosLoaded {
        count: photos.len(),
        skipped,
    });
    Ok(LoadOutcome { photos, statuses })
}

fn skip_or_abort(
    policy: DecodePolicy,
    err: ScanError,
    name: String,
    statuses: &mut Vec<Status>,
    skipped: &mut usize,
) -> Result<(), ScanError> {
    match policy {
        DecodePolicy::Abort => Err(err),
        DecodePolicy::Skip => {
            tracing::warn!(%name, error = %err, "skipping photo");
            statuses.push(Status::DecodeSkipped {
                name,
                reason: err.to_string(),
            });
            *skipped += 1;
            Ok(())
        }
    }
}

/// Discover and load in one step. Fails if nothing at all was found.
pub fn scan(
    inputs: &[PathBuf],
    backend: &impl ImageBackend,
    policy: DecodePolicy,
) -> Result<LoadOutcome, ScanError> {
    let files = discover(inputs)?;
    if files.is_empty() {
        return Err(ScanError::NoPhotos);
    }
    load_photos(&files, backend, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::test_helpers::{gradient, solid, write_png_fixtures};

    fn fixtures() -> tempfile::TempDir {
        let tmp = write_png_fixtures(&[
            ("b.png", gradient(20, 10)),
            ("a.png", solid(8, 8, [0, 0, 0, 255])),
            ("nested/c.png", gradient(5, 5)),
            (".hidden/d.png", gradient(5, 5)),
        ]);
        fs::write(tmp.path().join("notes.txt"), "not a photo").unwrap();
        tmp
    }

    #[test]
    fn discover_walks_directories_in_sorted_order() {
        let tmp = fixtures();
        let files = discover(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn discover_keeps_explicit_file_order() {
        let tmp = fixtures();
        let inputs = vec![tmp.path().join("b.png"), tmp.path().join("a.png")];
        let files = discover(&inputs).unwrap();
        assert_eq!(files, inputs);
    }

    #[test]
    fn discover_missing_input_is_error() {
        let err = discover(&[PathBuf::from("/nonexistent/photos")]).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn identify_is_stable_across_calls() {
        let tmp = fixtures();
        let path = tmp.path().join("a.png");
        assert_eq!(identify(&path).unwrap(), identify(&path).unwrap());
        assert_ne!(
            identify(&path).unwrap(),
            identify(&tmp.path().join("b.png")).unwrap()
        );
    }

    #[test]
    fn load_assigns_source_order_indices() {
        let tmp = fixtures();
        let outcome = scan(
            &[tmp.path().to_path_buf()],
            &RustBackend::new(),
            DecodePolicy::Skip,
        )
        .unwrap();
        let indices: Vec<usize> = outcome.photos.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(outcome.photos[1].bitmap.dimensions(), (20, 10));
        assert_eq!(
            outcome.statuses.last(),
            Some(&Status::PhotosLoaded {
                count: 3,
                skipped: 0
            })
        );
    }

    #[test]
    fn skip_policy_reports_and_continues() {
        let tmp = fixtures();
        let broken = tmp.path().join("broken.png");
        fs::write(&broken, b"not really a png").unwrap();
        let files = vec![broken, tmp.path().join("a.png")];

        let outcome = load_photos(&files, &RustBackend::new(), DecodePolicy::Skip).unwrap();
        assert_eq!(outcome.photos.len(), 1);
        assert_eq!(outcome.photos[0].index, 0);
        assert!(matches!(
            &outcome.statuses[0],
            Status::DecodeSkipped { name, .. } if name == "broken.png"
        ));
        assert_eq!(
            outcome.statuses[1],
            Status::PhotosLoaded {
                count: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let tmp = fixtures();
        let broken = tmp.path().join("broken.png");
        fs::write(&broken, b"not really a png").unwrap();
        let files = vec![tmp.path().join("a.png"), broken];

        let err = load_photos(&files, &RustBackend::new(), DecodePolicy::Abort).unwrap_err();
        assert!(matches!(err, ScanError::Decode { .. }));
    }

    #[test]
    fn scan_of_empty_directory_is_no_photos() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = scan(
            &[tmp.path().to_path_buf()],
            &RustBackend::new(),
            DecodePolicy::Skip,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::NoPhotos));
    }
}
