//! Cached print jobs
//!
//! Sliced projects are unpacked into a cache directory, one folder per job:
//!
//! ```text
//! <cache>/<job>/Metadata/plate_1.png
//! <cache>/<job>/Metadata/model_settings.config
//! ```
//!
//! The cache is filled by an external downloader; this module only reads it.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Thumbnail path inside a job folder
pub const THUMBNAIL_PATH: &str = "Metadata/plate_1.png";

/// Project configuration path inside a job folder
pub const MODEL_SETTINGS_PATH: &str = "Metadata/model_settings.config";

/// One cached job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintJobRecord {
    /// Job name (folder name)
    pub name: String,
    /// Job folder
    pub path: PathBuf,
    /// Thumbnail exists
    pub has_thumbnail: bool,
    /// Project configuration exists
    pub has_config: bool,
}

impl PrintJobRecord {
    /// Check whether the job can be offered for printing
    pub fn is_available(&self) -> bool {
        self.has_thumbnail && self.has_config
    }
}

/// Read access to the job cache
pub trait JobCache: Send + Sync {
    /// Names of all cached jobs, sorted
    fn cached_job_names(&self) -> io::Result<Vec<String>>;

    /// Record for one job, if it is cached
    fn job(&self, name: &str) -> Option<PrintJobRecord>;

    /// Contents of the job's `model_settings.config`
    fn read_model_settings(&self, name: &str) -> io::Result<String>;
}

/// Job cache backed by a directory
#[derive(Debug, Clone)]
pub struct FsJobCache {
    root: PathBuf,
}

impl FsJobCache {
    /// Create a cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, name: &str) -> io::Result<PathBuf> {
        if !is_valid_job_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid job name: {:?}", name),
            ));
        }
        Ok(self.root.join(name))
    }
}

impl JobCache for FsJobCache {
    fn cached_job_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn job(&self, name: &str) -> Option<PrintJobRecord> {
        let path = self.job_dir(name).ok()?;
        if !path.is_dir() {
            return None;
        }
        Some(PrintJobRecord {
            name: name.to_string(),
            has_thumbnail: path.join(THUMBNAIL_PATH).is_file(),
            has_config: path.join(MODEL_SETTINGS_PATH).is_file(),
            path,
        })
    }

    fn read_model_settings(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.job_dir(name)?.join(MODEL_SETTINGS_PATH))
    }
}

fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Error while reading a project configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed model_settings.config: {0}")]
pub struct ModelSettingsError(pub String);

/// Find the gcode reference in a project configuration
///
/// Looks for `<metadata key="gcode_file" value="..."/>` directly under a
/// `<plate>` element of the document root and returns the first value.
pub fn gcode_file_reference(xml: &str) -> Result<Option<String>, ModelSettingsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Element names from the root down to the current element
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ModelSettingsError(e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let in_plate = path.len() == 2 && path[1] == b"plate";
                if in_plate && e.name().as_ref() == b"metadata" {
                    let key = e
                        .try_get_attribute("key")
                        .map_err(|e| ModelSettingsError(e.to_string()))?;
                    let is_gcode_file = match key {
                        Some(attr) => attr.value.as_ref() == b"gcode_file",
                        None => false,
                    };
                    if is_gcode_file {
                        if let Some(attr) = e
                            .try_get_attribute("value")
                            .map_err(|e| ModelSettingsError(e.to_string()))?
                        {
                            let value = attr
                                .unescape_value()
                                .map_err(|e| ModelSettingsError(e.to_string()))?;
                            if !value.is_empty() {
                                return Ok(Some(value.into_owned()));
                            }
                        }
                    }
                }
                if matches!(event, Event::Start(_)) {
                    path.push(e.name().as_ref().to_vec());
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
