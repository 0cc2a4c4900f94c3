//! Writing rewritten configurations

use crate::error::ScanError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// `job-<name>-config-<timestamp>.xml`; path separators in folder job
/// names become `_`
pub fn config_file_name(job: &str, timestamp: u64) -> String {
    let job = job.replace(['/', '\\'], "_");
    format!("job-{job}-config-{timestamp}.xml")
}

/// Write `doc` into `dir` under the downloaded-config naming, creating
/// `dir` if needed; returns the written path
pub fn write_config(dir: &Path, job: &str, doc: &str) -> Result<PathBuf, ScanError> {
    fs::create_dir_all(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let path = dir.join(config_file_name(job, timestamp));
    overwrite(&path, doc)?;
    Ok(path)
}

/// Replace the file at `path` with `doc`
pub fn overwrite(path: &Path, doc: &str) -> Result<(), ScanError> {
    fs::write(path, doc).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })
}
