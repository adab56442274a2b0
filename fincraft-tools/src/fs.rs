//! Data-directory tools
//!
//! Every tool works on plain file names inside one data directory. Names
//! with path separators or `..` never reach the filesystem.

use crate::csv;
use fincraft_error::{Error, ErrorKind, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// The host side of the built-in tools
#[derive(Debug, Clone)]
pub struct Toolbox {
    data_dir: PathBuf,
}

impl Toolbox {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Names of the regular files in the data directory, sorted
    pub fn list_files(&self) -> Result<Vec<String>> {
        let dir = self.existing_data_dir("tools::list_files")?;

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();

        info!(dir = %dir.display(), count = files.len(), "listed data files");
        Ok(files)
    }

    /// Read a `.json` or `.csv` file into a tagged value
    pub fn read_structured_file(&self, file_name: &str) -> Result<Value> {
        const OP: &str = "tools::read_structured_file";

        let dir = self.existing_data_dir(OP)?;
        let path = resolve(dir, file_name).map_err(|e| e.with_operation(OP))?;

        if !path.exists() {
            return Err(Error::file_not_found(
                format!("file '{}' not found in {}.", file_name, dir.display()),
                path.display().to_string(),
            )
            .with_operation(OP));
        }

        let ext = extension(&path);
        let (kind, data) = match ext.as_str() {
            "json" => {
                let text = fs::read_to_string(&path)?;
                let data: Value = serde_json::from_str(&text).map_err(|e| {
                    Error::parse_failed(format!("invalid json in '{}': {}", file_name, e))
                        .with_operation(OP)
                        .set_source(e)
                })?;
                ("json", data)
            }
            "csv" => {
                let text = fs::read_to_string(&path)?;
                let rows = csv::parse_rows(&text)
                    .map_err(|e| e.with_operation(OP).with_context("file_name", file_name))?;
                ("csv", Value::Array(rows))
            }
            _ => {
                return Err(Error::unsupported(format!(
                    "unsupported structured format: {}",
                    display_ext(&ext)
                ))
                .with_operation(OP));
            }
        };

        debug!(file_name, kind, "read structured file");
        Ok(json!({
            "type": kind,
            "file_name": file_name,
            "data": data,
        }))
    }

    /// Read a `.txt` or `.md` file
    pub fn read_text_file(&self, file_name: &str) -> Result<String> {
        const OP: &str = "tools::read_text_file";

        let dir = self.existing_data_dir(OP)?;
        let path = resolve(dir, file_name).map_err(|e| e.with_operation(OP))?;

        if !path.exists() {
            return Err(Error::file_not_found(
                format!("file '{}' not found.", path.display()),
                path.display().to_string(),
            )
            .with_operation(OP));
        }

        if !TEXT_EXTENSIONS.contains(&extension(&path).as_str()) {
            return Err(Error::unsupported(format!("unsupported text format: {}", file_name))
                .with_operation(OP));
        }

        let text = fs::read_to_string(&path)?;
        debug!(file_name, bytes = text.len(), "read text file");
        Ok(text)
    }

    /// Record the closing message of a run
    pub fn terminate(&self, message: &str) {
        debug!(closing = message, "terminate called");
    }

    fn existing_data_dir(&self, operation: &'static str) -> Result<&Path> {
        if self.data_dir.is_dir() {
            return Ok(&self.data_dir);
        }
        Err(Error::file_not_found(
            format!("data directory not found: {}", self.data_dir.display()),
            self.data_dir.display().to_string(),
        )
        .with_operation(operation))
    }
}

/// Join a bare file name onto the data directory
fn resolve(dir: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.is_empty() {
        return Err(Error::invalid_argument("file name is empty"));
    }

    let input = Path::new(file_name);
    let mut components = input.components();
    let bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !bare || file_name.contains(['/', '\\']) {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("file name must not contain a path: {}", file_name),
        )
        .with_context("file_name", file_name));
    }

    Ok(dir.join(input))
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn display_ext(ext: &str) -> String {
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    }
}
