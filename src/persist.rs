//! CSV persistence for the raw cache and the processed tables.
//!
//! Writes go to a temporary file next to the target and are renamed into
//! place, so readers never observe a half-written table.

use crate::error::PersistError;
use log::debug;
use polars::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A fully written CSV waiting to be renamed onto its target path.
///
/// Dropping it without calling [`StagedFile::commit`] deletes the temporary
/// file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn commit(self) -> Result<PathBuf, PersistError> {
        let StagedFile { temp, target } = self;
        temp.persist(&target)
            .map_err(|e| PersistError::Io(target.clone(), e.error))?;
        debug!("Committed {}", target.display());
        Ok(target)
    }
}

/// Encodes `df` (with header) into a temporary file in the target's directory.
pub fn stage_csv(df: &mut DataFrame, target: &Path) -> Result<StagedFile, PersistError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PersistError::Io(dir.clone(), e))?;

    let mut temp =
        NamedTempFile::new_in(&dir).map_err(|e| PersistError::Io(target.to_path_buf(), e))?;
    CsvWriter::new(temp.as_file_mut())
        .include_header(true)
        .finish(df)
        .map_err(|e| PersistError::Encode(target.to_path_buf(), e))?;
    temp.as_file_mut()
        .flush()
        .map_err(|e| PersistError::Io(target.to_path_buf(), e))?;

    Ok(StagedFile {
        temp,
        target: target.to_path_buf(),
    })
}

/// Writes `df` to `target` in one step.
pub fn write_csv(df: &mut DataFrame, target: &Path) -> Result<PathBuf, PersistError> {
    stage_csv(df, target)?.commit()
}

/// Reads a CSV with a header, keeping every column as text.
pub fn read_text_csv(path: &Path) -> Result<DataFrame, PersistError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| PersistError::Read(path.to_path_buf(), e))
}
