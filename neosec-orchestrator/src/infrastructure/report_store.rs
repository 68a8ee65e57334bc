//! Run output persistence
//!
//! Layout under the data root:
//!
//! ```text
//! <data_dir>/raw_outputs/<run-id>/<task-id>.stdout
//! <data_dir>/raw_outputs/<run-id>/<task-id>.stderr
//! <data_dir>/reports/<run-id>.json
//! ```
//!
//! Raw captures are written as the scheduler produces them (already subject
//! to the capture cap); the JSON report is written once at the end of the
//! run.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use neosec_core::domain::scan::ScanResult;

/// Sink for per-task raw captures. The scheduler writes through this trait
/// so tests can substitute an in-memory double.
#[async_trait]
pub trait RawCaptureSink: Send + Sync {
    async fn store_raw(
        &self,
        run_id: Uuid,
        task_id: &str,
        stdout: &[u8],
        stderr: &[u8],
    ) -> std::io::Result<()>;
}

/// Filesystem-backed store for raw captures and serialized reports.
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn raw_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join("raw_outputs").join(run_id.to_string())
    }

    /// Serialize a finished run to `reports/<run-id>.json` and return the
    /// report path.
    pub async fn write_report(&self, result: &ScanResult) -> std::io::Result<PathBuf> {
        let dir = self.root.join("reports");
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.json", result.run_id));
        let json = serde_json::to_vec_pretty(result).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, json).await?;

        debug!(report = %path.display(), "report written");
        Ok(path)
    }
}

#[async_trait]
impl RawCaptureSink for ReportStore {
    async fn store_raw(
        &self,
        run_id: Uuid,
        task_id: &str,
        stdout: &[u8],
        stderr: &[u8],
    ) -> std::io::Result<()> {
        let dir = self.raw_dir(run_id);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join(format!("{}.stdout", task_id)), stdout).await?;
        tokio::fs::write(dir.join(format!("{}.stderr", task_id)), stderr).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use neosec_core::domain::scan::RunStatus;

    fn empty_result() -> ScanResult {
        ScanResult {
            run_id: Uuid::new_v4(),
            workflow: "test".into(),
            target: "192.0.2.1".into(),
            status: RunStatus::Succeeded,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            tasks: vec![],
            assets: vec![],
            vulnerabilities: vec![],
        }
    }

    #[tokio::test]
    async fn raw_captures_land_under_run_and_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let run_id = Uuid::new_v4();

        store
            .store_raw(run_id, "portscan", b"out-bytes", b"err-bytes")
            .await
            .unwrap();

        let base = dir
            .path()
            .join("raw_outputs")
            .join(run_id.to_string());
        assert_eq!(
            std::fs::read(base.join("portscan.stdout")).unwrap(),
            b"out-bytes"
        );
        assert_eq!(
            std::fs::read(base.join("portscan.stderr")).unwrap(),
            b"err-bytes"
        );
    }

    #[tokio::test]
    async fn report_serializes_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let result = empty_result();

        let path = store.write_report(&result).await.unwrap();
        assert!(path.ends_with(format!("{}.json", result.run_id)));

        let content = std::fs::read_to_string(&path).unwrap();
        let back: ScanResult = serde_json::from_str(&content).unwrap();
        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.status, RunStatus::Succeeded);
    }
}
