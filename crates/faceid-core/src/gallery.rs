//! Enrolled reference images.
//!
//! A gallery is enumerated fresh on every verification attempt, so adding or
//! removing a reference takes effect on the next attempt.

use crate::raw_image::{ImageError, RawImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery not found: {0}")]
    NotFound(String),
    #[error("failed to enumerate gallery {path}: {source}")]
    Enumerate {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Addressable reference image within a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageHandle {
    name: String,
    location: PathBuf,
}

impl ImageHandle {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Identity used in diagnostics and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

/// Ordered, re-enumerable collection of reference images.
///
/// `list_images` must return the same order for the same contents.
pub trait GallerySource {
    fn list_images(&self) -> Result<Vec<ImageHandle>, GalleryError>;
    fn read_image(&self, handle: &ImageHandle) -> Result<RawImage, ImageError>;
}

/// Gallery backed by a directory of image files.
///
/// Every regular file counts as a reference (dot-files are skipped); order is
/// by file name. Files that fail to decode are not filtered out here: they
/// surface as errors when read.
#[derive(Debug, Clone)]
pub struct DirectoryGallery {
    root: PathBuf,
}

impl DirectoryGallery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl GallerySource for DirectoryGallery {
    fn list_images(&self) -> Result<Vec<ImageHandle>, GalleryError> {
        let enumerate_err = |source: std::io::Error| GalleryError::Enumerate {
            path: self.root.display().to_string(),
            source,
        };

        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GalleryError::NotFound(self.root.display().to_string())
            } else {
                enumerate_err(e)
            }
        })?;

        let mut handles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(enumerate_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name.starts_with('.') || !path.is_file() {
                continue;
            }
            handles.push(ImageHandle::new(name, path));
        }

        handles.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(
            root = %self.root.display(),
            count = handles.len(),
            "enumerated gallery"
        );

        Ok(handles)
    }

    fn read_image(&self, handle: &ImageHandle) -> Result<RawImage, ImageError> {
        RawImage::open(handle.location())
    }
}
