use crate::error::PipelineError;
use log::info;
use std::fs;
use std::io;
use std::path::Path;

pub fn ensure_dir_exists(path: &Path) -> Result<(), PipelineError> {
    match fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(PipelineError::NotADirectory(path.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating data directory: {}", path.display());
            fs::create_dir_all(path)
                .map_err(|e| PipelineError::DataDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(PipelineError::DataDirCreation(path.to_path_buf(), e)),
    }
}
