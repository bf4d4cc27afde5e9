//! Failure log: one JSON line per failed task, for replay or inspection.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use progscan_engine::FailedTask;

use crate::sink::ensure_output_dir;

/// Append the run's failed tasks as JSONL under the output directory.
/// Returns `None` when there was nothing to record.
pub fn write_failure_log(
    output_dir: &Path,
    university_key: &str,
    failed: &[FailedTask],
) -> anyhow::Result<Option<PathBuf>> {
    if failed.is_empty() {
        return Ok(None);
    }
    ensure_output_dir(output_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{university_key}_failures_{timestamp}.jsonl"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not open failure log {:?}", path))?;
    let mut writer = BufWriter::new(file);
    for failure in failed {
        let line = serde_json::to_string(failure).context("failure entry")?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(Some(path))
}
