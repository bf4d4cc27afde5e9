//! Record persistence: CSV output written atomically into the output
//! directory.

use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use progscan_core::RawRecord;
use tempfile::NamedTempFile;

const MISSING_FIELD: &str = "N/A";

/// Where accepted records end up after a run. The sink accepts records as
/// given; deduplication already happened upstream.
pub trait RecordSink {
    fn write(&self, records: &[RawRecord]) -> anyhow::Result<PathBuf>;
}

/// Ensure the output directory exists and is writable.
pub fn ensure_output_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        let meta = fs::metadata(dir).context("output path not accessible")?;
        if !meta.is_dir() {
            anyhow::bail!("output path {:?} is not a directory", dir);
        }
    } else {
        fs::create_dir_all(dir).context("could not create output directory")?;
    }
    // Writability check.
    NamedTempFile::new_in(dir).context("output directory not writable")?;
    Ok(())
}

/// Write `content` to `{dir}/{filename}` through a temp file and rename, so
/// a crash mid-write never leaves a truncated output file.
fn write_atomically(dir: &Path, filename: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
    ensure_output_dir(dir)?;

    let target = dir.join(filename);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    if target.exists() {
        fs::remove_file(&target)?;
    }
    tmp.persist(&target)
        .map_err(|e| io::Error::from(e.error))
        .with_context(|| format!("could not persist {:?}", target))?;
    Ok(target)
}

/// CSV sink with a timestamped filename per run:
/// `{university}_programs_{timestamp}.csv`.
pub struct CsvSink {
    output_dir: PathBuf,
    university_key: String,
}

impl CsvSink {
    pub fn new(output_dir: PathBuf, university_key: impl Into<String>) -> Self {
        Self {
            output_dir,
            university_key: university_key.into(),
        }
    }

    fn filename(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        format!("{}_programs_{timestamp}.csv", self.university_key)
    }
}

impl RecordSink for CsvSink {
    fn write(&self, records: &[RawRecord]) -> anyhow::Result<PathBuf> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record([
            "university_code",
            "program_name",
            "faculty",
            "detail_url",
            "apply_link",
            "open_date",
            "deadline",
        ])?;
        for record in records {
            writer.write_record([
                record.university_code.as_str(),
                record.program_name.as_str(),
                record.faculty.as_deref().unwrap_or(MISSING_FIELD),
                record.detail_url.as_str(),
                record.apply_link.as_deref().unwrap_or(MISSING_FIELD),
                record.open_date.as_deref().unwrap_or(MISSING_FIELD),
                record.deadline.as_deref().unwrap_or(MISSING_FIELD),
            ])?;
        }
        let content = writer.into_inner().context("csv buffer")?;

        write_atomically(&self.output_dir, &self.filename(), &content)
    }
}
