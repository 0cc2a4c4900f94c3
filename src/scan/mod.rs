//! Config scan
//!
//! Runs one query over many job configurations on disk. Every job is
//! independent: a job whose file cannot be read, whose XML is broken or on
//! which the query fails is logged and reported, and the scan goes on.

pub mod output;
pub mod source;

pub use source::{discover, ConfigSource};

use crate::engine::{ConfigQueryEngine, Intent, Outcome};
use crate::error::ScanError;
use rayon::prelude::*;
use tracing::{debug, warn};

/// Result of evaluating the query on one job
#[derive(Debug)]
pub struct JobReport {
    pub source: ConfigSource,
    pub result: Result<Outcome, ScanError>,
}

impl JobReport {
    pub fn is_match(&self) -> bool {
        self.result.as_ref().is_ok_and(Outcome::is_match)
    }
}

/// Evaluate `query` on every source, returning reports in input order
///
/// With `parallel`, jobs are spread over the rayon thread pool; the
/// engine's query cache is the only state they share.
pub fn run(
    engine: &ConfigQueryEngine,
    sources: &[ConfigSource],
    query: &str,
    intent: &Intent,
    parallel: bool,
) -> Vec<JobReport> {
    debug!(jobs = sources.len(), parallel, "starting config scan");

    if parallel {
        sources
            .par_iter()
            .map(|source| evaluate_source(engine, source, query, intent))
            .collect()
    } else {
        sources
            .iter()
            .map(|source| evaluate_source(engine, source, query, intent))
            .collect()
    }
}

fn evaluate_source(engine: &ConfigQueryEngine, source: &ConfigSource, query: &str, intent: &Intent) -> JobReport {
    let result = source
        .read()
        .and_then(|text| engine.evaluate(&text, query, intent).map_err(ScanError::from));

    if let Err(err) = &result {
        warn!(job = %source.job, path = %source.path.display(), "error matching job: {err}");
    }

    JobReport {
        source: source.clone(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::fs;

    fn write_jobs(dir: &std::path::Path) -> Vec<ConfigSource> {
        fs::write(dir.join("job-a-config-1.xml"), "<project><disabled>true</disabled></project>").unwrap();
        fs::write(dir.join("job-b-config-1.xml"), "<project><disabled>false</disabled>").unwrap();
        fs::write(dir.join("job-c-config-1.xml"), "<project><disabled>false</disabled></project>").unwrap();
        discover(&[dir]).unwrap()
    }

    #[test]
    fn test_failed_job_does_not_stop_scan() {
        let dir = tempfile::tempdir().unwrap();
        let sources = write_jobs(dir.path());
        let engine = ConfigQueryEngine::new();

        for parallel in [false, true] {
            let reports = run(&engine, &sources, "//disabled[. = 'false']", &Intent::MatchOnly, parallel);
            let jobs: Vec<_> = reports.iter().map(|r| r.source.job.as_str()).collect();
            assert_eq!(jobs, ["a", "b", "c"]);
            assert!(!reports[0].is_match());
            assert!(matches!(reports[1].result, Err(ScanError::Engine(EngineError::Parse(_)))));
            assert!(reports[2].is_match());
        }
    }

    #[test]
    fn test_missing_file_reported() {
        let engine = ConfigQueryEngine::new();
        let sources = [ConfigSource::from_path("/no/such/job-x-config-1.xml")];
        let reports = run(&engine, &sources, "//a", &Intent::MatchOnly, false);
        assert!(matches!(reports[0].result, Err(ScanError::Io { .. })));
        assert_eq!(reports[0].source.job, "x");
    }

    #[test]
    fn test_rewrite_returns_documents() {
        let dir = tempfile::tempdir().unwrap();
        let sources = write_jobs(dir.path());
        let engine = ConfigQueryEngine::new();
        let intent = Intent::MatchAndMutate("true".to_string());
        let reports = run(&engine, &sources, "//disabled", &intent, true);
        let rewritten = reports[2].result.as_ref().ok().and_then(Outcome::rewritten);
        assert_eq!(rewritten, Some("<project><disabled>true</disabled></project>\n"));
    }
}
