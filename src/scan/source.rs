//! Locating job configurations on disk

use crate::error::ScanError;
use std::fs;
use std::path::{Path, PathBuf};

/// One job configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Job name derived from the path
    pub job: String,
    pub path: PathBuf,
}

impl ConfigSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        ConfigSource {
            job: job_name(&path),
            path,
        }
    }

    /// Read the configuration text
    pub fn read(&self) -> Result<String, ScanError> {
        fs::read_to_string(&self.path).map_err(|source| ScanError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Expand files and directories into config sources, sorted by path
///
/// A file is taken as given. A directory contributes its `*.xml` files and
/// the `config.xml` of each immediate subdirectory (a server's
/// `jobs/<name>/config.xml` layout); nothing deeper is searched.
pub fn discover<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ConfigSource>, ScanError> {
    let mut found = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|source| io_error(path, source))?;
        if !metadata.is_dir() {
            found.push(path.to_path_buf());
            continue;
        }

        let entries = fs::read_dir(path).map_err(|source| io_error(path, source))?;
        for entry in entries {
            let entry_path = entry.map_err(|source| io_error(path, source))?.path();
            if entry_path.is_dir() {
                let config = entry_path.join("config.xml");
                if config.is_file() {
                    found.push(config);
                }
            } else if is_xml_file(&entry_path) {
                found.push(entry_path);
            }
        }
    }

    found.sort();
    found.dedup();
    Ok(found.into_iter().map(ConfigSource::from_path).collect())
}

fn io_error(path: &Path, source: std::io::Error) -> ScanError {
    ScanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_xml_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// Job name for a config path
///
/// - `job-<name>-config-<timestamp>.xml` (downloaded configs): `<name>`
/// - `<name>/config.xml` (server layout): `<name>`
/// - anything else: the file stem
pub fn job_name(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

    if path.file_name().is_some_and(|name| name == "config.xml") {
        if let Some(dir) = path.parent().and_then(Path::file_name) {
            return dir.to_string_lossy().into_owned();
        }
    }

    if let Some((name, timestamp)) = stem.strip_prefix("job-").and_then(|rest| rest.rsplit_once("-config-")) {
        if !name.is_empty() && !timestamp.is_empty() && timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return name.to_string();
        }
    }

    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name() {
        assert_eq!(job_name(Path::new("out/job-deploy-api-config-1700000000.xml")), "deploy-api");
        assert_eq!(job_name(Path::new("jobs/nightly/config.xml")), "nightly");
        assert_eq!(job_name(Path::new("build.xml")), "build");
        assert_eq!(job_name(Path::new("job-x-config-latest.xml")), "job-x-config-latest");
        assert_eq!(job_name(Path::new("config.xml")), "config");
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.xml"), "<b/>").unwrap();
        fs::write(dir.path().join("a.XML"), "<a/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(dir.path().join("nightly")).unwrap();
        fs::write(dir.path().join("nightly/config.xml"), "<n/>").unwrap();
        fs::create_dir_all(dir.path().join("deep/deeper")).unwrap();
        fs::write(dir.path().join("deep/deeper/config.xml"), "<d/>").unwrap();

        let sources = discover(&[dir.path()]).unwrap();
        let jobs: Vec<_> = sources.iter().map(|s| s.job.as_str()).collect();
        assert_eq!(jobs, ["a", "b", "nightly"]);
        assert_eq!(sources[1].read().unwrap(), "<b/>");
    }

    #[test]
    fn test_discover_missing_path() {
        let err = discover(&["/definitely/not/here"]).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }
}
