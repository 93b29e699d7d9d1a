use crate::analysis::AggregateReport;
use crate::report::RunArtifacts;
use std::path::Path;

pub fn write_results(artifacts: &RunArtifacts, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, serde_json::to_string_pretty(artifacts)?)?;
    Ok(())
}

pub fn write_aggregate(report: &AggregateReport, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ExecutionStatus;

    #[test]
    fn results_file_roundtrips() {
        let artifacts = RunArtifacts {
            benchmark_id: "b-1".into(),
            config_name: "baseline".into(),
            config_hash: "deadbeefdeadbeef".into(),
            status: ExecutionStatus::Completed,
            runs: vec![],
            skips: vec![],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        write_results(&artifacts, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: RunArtifacts = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.config_hash, "deadbeefdeadbeef");
        assert!(back.status.is_completed());
    }
}
