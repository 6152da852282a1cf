use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use crate::drivers::{ExportRecord, ScopeError, ScopeFrame};

pub const CSV_HEADER: &str = "Timestamp_ms,Signal,Value_mV,Envelope_mV,Condition";

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

// 文件名里只保留字母数字，避免设备发来奇怪的标签
fn file_token(raw: &str) -> String {
    let token: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if token.is_empty() { "unknown".to_owned() } else { token }
}

// 标签含逗号、引号或换行时按 CSV 规则加引号
fn csv_field(raw: &str) -> std::borrow::Cow<'_, str> {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\"")).into()
    } else {
        raw.into()
    }
}

/// Writes the export log as CSV into `dir`. Returns the file written.
pub fn export_csv<'a, I>(records: I, dir: &Path) -> Result<PathBuf, ScopeError>
where
    I: IntoIterator<Item = &'a ExportRecord>,
{
    let mut records = records.into_iter().peekable();
    let first = records.peek().ok_or(ScopeError::EmptyExport)?;
    let filename = format!(
        "biosim_{}_{}_{}.csv",
        file_token(&first.signal),
        file_token(&first.condition),
        epoch_millis()
    );
    let path = dir.join(filename);
    let mut w = BufWriter::new(File::create(&path)?);
    writeln!(w, "{CSV_HEADER}")?;
    for record in records {
        writeln!(
            w,
            "{},{},{:.4},{:.4},{}",
            record.sample.timestamp_ms,
            csv_field(&record.signal),
            record.sample.value,
            record.sample.envelope.unwrap_or(0.0),
            csv_field(&record.condition)
        )?;
    }
    w.flush()?;
    log::info!("exported csv to {}", path.display());
    Ok(path)
}

/// Saves the last rendered frame as a PNG snapshot.
pub fn save_png(frame: &ScopeFrame, signal: &str, dir: &Path) -> Result<PathBuf, ScopeError> {
    let bytes = frame.to_png()?;
    let path = dir.join(format!("biosim_{}_{}.png", file_token(signal), epoch_millis()));
    std::fs::write(&path, bytes)?;
    log::info!("saved snapshot to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::buffer::Sample;

    fn record(t: u64, value: f64, envelope: Option<f64>) -> ExportRecord {
        ExportRecord {
            sample: Sample {
                timestamp_ms: t,
                value,
                envelope,
            },
            signal: "EMG".to_owned(),
            condition: "fatigue".to_owned(),
        }
    }

    #[test]
    fn csv_has_header_and_four_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let log = vec![record(1000, 0.5, Some(0.25)), record(1010, -1.0, None)];
        let path = export_csv(&log, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("biosim_EMG_fatigue_"));
        assert!(name.ends_with(".csv"));
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1000,EMG,0.5000,0.2500,fatigue");
        assert_eq!(lines[2], "1010,EMG,-1.0000,0.0000,fatigue");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn labels_with_separators_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let mut odd = record(5, 1.0, None);
        odd.condition = "rest, seated".to_owned();
        odd.signal = "E\"MG".to_owned();
        let path = export_csv(&vec![odd], dir.path()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert_eq!(line, "5,\"E\"\"MG\",1.0000,0.0000,\"rest, seated\"");
    }

    #[test]
    fn empty_log_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let log: Vec<ExportRecord> = Vec::new();
        assert!(matches!(export_csv(&log, dir.path()), Err(ScopeError::EmptyExport)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn png_snapshot_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let frame = ScopeFrame {
            width: 2,
            height: 2,
            rgb: vec![255; 12],
        };
        let path = save_png(&frame, "P/PG", dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("biosim_P_PG_"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
