//! Append-only turn telemetry.
//!
//! Every completed turn is appended as one JSON line to a file named for the
//! current UTC date; a new file starts automatically at the next day
//! boundary. This is deliberately not a queryable store: it exists so an
//! operator can `tail -f` or batch-ingest it elsewhere, the same shape as the
//! rotating JSONL logger the rest of this system's turn history came from.

mod telemetry;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub use telemetry::{sample_ram_peak, EnergyMeter};

/// Process and system memory at the moment a turn finished, in MB.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RamPeak {
    pub proc_mb: f64,
    pub sys_mb: f64,
}

/// One tool invocation as it appears on a turn's event record.
/// `normalized_tool_name` collapses any name the executor didn't recognize
/// down to `"other"`, to cap metric cardinality.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub normalized_tool_name: String,
    pub ok: bool,
    pub error_class: Option<String>,
    pub latency_ms: u64,
}

/// Retrieval-augmentation stats, zeroed while no RAG subsystem is wired in.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct RagStats {
    pub top_k: u32,
    pub hits: u32,
}

/// One row appended to the sink. Callers build this from the final pipeline
/// result; field names are part of the on-disk contract, not an internal
/// implementation detail, so they are not renamed to match Rust convention.
#[derive(Debug, Clone, Serialize)]
pub struct TurnEvent {
    pub version: String,
    pub timestamp: String,
    pub trace_id: String,
    pub session_id: String,
    pub route: String,
    pub e2e_ms_first: u64,
    pub e2e_ms_full: u64,
    pub ram_peak: RamPeak,
    pub tool_calls: Vec<ToolCallRecord>,
    pub energy_wh: f64,
    pub oracle_state: String,
    pub pii_masked: bool,
    pub consent_scopes: Vec<String>,
    pub rag_stats: RagStats,
    pub input_text: String,
    pub output_text: String,
    pub language: String,
}

impl TurnEvent {
    /// Stamps the fields every turn shares: schema version, current UTC
    /// timestamp, and the always-on defaults this deployment hasn't
    /// outgrown yet (no consent-scope selection UI, no PII unmasking path).
    pub fn stamp(self) -> Self {
        Self { timestamp: Utc::now().to_rfc3339(), version: "1".to_string(), ..self }
    }
}

struct RotatingFile {
    dir: PathBuf,
    day: Option<chrono::NaiveDate>,
    file: Option<File>,
}

impl RotatingFile {
    fn new(dir: PathBuf) -> Self {
        Self { dir, day: None, file: None }
    }

    fn path_for(&self, day: chrono::NaiveDate) -> PathBuf {
        self.dir.join(format!("turns-{}.jsonl", day.format("%Y-%m-%d")))
    }

    async fn writer(&mut self) -> std::io::Result<&mut File> {
        let today = Utc::now().date_naive();
        if self.file.is_none() || self.day != Some(today) {
            tokio::fs::create_dir_all(&self.dir).await?;
            let path = self.path_for(today);
            let file = OpenOptions::new().create(true).append(true).open(path).await?;
            self.file = Some(file);
            self.day = Some(today);
        }
        Ok(self.file.as_mut().expect("just set above"))
    }
}

/// Shared sink; clone freely, writes are serialized internally.
#[derive(Clone)]
pub struct TurnEventSink {
    inner: std::sync::Arc<Mutex<RotatingFile>>,
}

impl TurnEventSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { inner: std::sync::Arc::new(Mutex::new(RotatingFile::new(dir.as_ref().to_path_buf()))) }
    }

    /// Appends `event` as a single JSON line. Errors are logged (with the
    /// `tracing` feature) and otherwise swallowed: a telemetry write must
    /// never fail a turn.
    pub async fn record(&self, event: &TurnEvent) {
        let result = self.try_record(event).await;
        if let Err(_err) = result {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "failed to append turn event");
        }
    }

    async fn try_record(&self, event: &TurnEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut inner = self.inner.lock().await;
        let file = inner.writer().await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> TurnEvent {
        TurnEvent {
            version: "1".into(),
            timestamp: Utc::now().to_rfc3339(),
            trace_id: "t-1".into(),
            session_id: "s-1".into(),
            route: "micro".into(),
            e2e_ms_first: 120,
            e2e_ms_full: 120,
            ram_peak: RamPeak { proc_mb: 0.0, sys_mb: 0.0 },
            tool_calls: Vec::new(),
            energy_wh: 0.0001,
            oracle_state: "NORMAL".into(),
            pii_masked: true,
            consent_scopes: vec!["basic_logging".into()],
            rag_stats: RagStats::default(),
            input_text: "hi".into(),
            output_text: "hello".into(),
            language: "en".into(),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TurnEventSink::new(dir.path());

        sink.record(&sample_event()).await;
        sink.record(&sample_event()).await;

        let today = Utc::now().date_naive();
        let path = dir.path().join(format!("turns-{}.jsonl", today.format("%Y-%m-%d")));
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
        for line in contents.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["route"], "micro");
        }
    }
}
