//! Result export: one semicolon-delimited row per participant, written as a
//! per-participant file plus the full cumulative file.

use crate::config::TmtConfig;
use crate::store::{CumulativeLog, KeyValueStore};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use tmt_core::{ResultsAggregate, TmtError, TrialKind, TrialResult};
use tracing::info;

pub const DELIMITER: &str = ";";

pub const HEADER: [&str; 15] = [
    "participant_id",
    "timestamp_iso",
    "timestamp_local",
    "pA_time_s",
    "pA_errors",
    "pA_n",
    "tA_time_s",
    "tA_errors",
    "tA_n",
    "pB_time_s",
    "pB_errors",
    "pB_n",
    "tB_time_s",
    "tB_errors",
    "tB_n",
];

/// Flat projection of a participant's session. Every cell is text; absent
/// trials export as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(default, deserialize_with = "cell")]
    pub participant_id: String,
    #[serde(default, deserialize_with = "cell")]
    pub timestamp_iso: String,
    #[serde(default, deserialize_with = "cell")]
    pub timestamp_local: String,

    #[serde(rename = "pA_time_s", default, deserialize_with = "cell")]
    pub pa_time_s: String,
    #[serde(rename = "pA_errors", default, deserialize_with = "cell")]
    pub pa_errors: String,
    #[serde(rename = "pA_n", default, deserialize_with = "cell")]
    pub pa_n: String,

    #[serde(rename = "tA_time_s", default, deserialize_with = "cell")]
    pub ta_time_s: String,
    #[serde(rename = "tA_errors", default, deserialize_with = "cell")]
    pub ta_errors: String,
    #[serde(rename = "tA_n", default, deserialize_with = "cell")]
    pub ta_n: String,

    #[serde(rename = "pB_time_s", default, deserialize_with = "cell")]
    pub pb_time_s: String,
    #[serde(rename = "pB_errors", default, deserialize_with = "cell")]
    pub pb_errors: String,
    #[serde(rename = "pB_n", default, deserialize_with = "cell")]
    pub pb_n: String,

    #[serde(rename = "tB_time_s", default, deserialize_with = "cell")]
    pub tb_time_s: String,
    #[serde(rename = "tB_errors", default, deserialize_with = "cell")]
    pub tb_errors: String,
    #[serde(rename = "tB_n", default, deserialize_with = "cell")]
    pub tb_n: String,
}

/// Accepts strings, numbers or null so rows written by older tools still load
fn cell<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// Milliseconds to seconds with one decimal, halves rounded up
pub fn seconds(ms: f64) -> String {
    let tenths = (ms / 100.0).round();
    format!("{:.1}", tenths / 10.0)
}

fn trial_cells(result: Option<&TrialResult>) -> [String; 3] {
    match result {
        Some(r) => [seconds(r.duration_ms), r.errors.to_string(), r.n.to_string()],
        None => Default::default(),
    }
}

impl ExportRow {
    pub fn build(participant_id: &str, results: &ResultsAggregate, at: DateTime<Local>) -> Self {
        let [pa_time_s, pa_errors, pa_n] = trial_cells(results.get(TrialKind::PracticeA));
        let [ta_time_s, ta_errors, ta_n] = trial_cells(results.get(TrialKind::TestA));
        let [pb_time_s, pb_errors, pb_n] = trial_cells(results.get(TrialKind::PracticeB));
        let [tb_time_s, tb_errors, tb_n] = trial_cells(results.get(TrialKind::TestB));
        Self {
            participant_id: participant_id.to_string(),
            timestamp_iso: at
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp_local: at.format("%d/%m/%y %H:%M:%S").to_string(),
            pa_time_s,
            pa_errors,
            pa_n,
            ta_time_s,
            ta_errors,
            ta_n,
            pb_time_s,
            pb_errors,
            pb_n,
            tb_time_s,
            tb_errors,
            tb_n,
        }
    }

    /// Cells in [`HEADER`] order
    pub fn fields(&self) -> [&str; 15] {
        [
            &self.participant_id,
            &self.timestamp_iso,
            &self.timestamp_local,
            &self.pa_time_s,
            &self.pa_errors,
            &self.pa_n,
            &self.ta_time_s,
            &self.ta_errors,
            &self.ta_n,
            &self.pb_time_s,
            &self.pb_errors,
            &self.pb_n,
            &self.tb_time_s,
            &self.tb_errors,
            &self.tb_n,
        ]
    }
}

fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([';', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// BOM-prefixed, CRLF-separated text with a header line. No rows, no text.
pub fn to_delimited(rows: &[ExportRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(HEADER.join(DELIMITER));
    for row in rows {
        let cells: Vec<Cow<'_, str>> = row.fields().into_iter().map(escape_field).collect();
        lines.push(cells.join(DELIMITER));
    }
    format!("\u{feff}{}", lines.join("\r\n"))
}

pub fn participant_file_name(participant_id: &str, at: DateTime<Local>) -> String {
    // underscores are kept; each piece between them is slugged
    let slug = participant_id
        .trim()
        .split('_')
        .map(slug::slugify)
        .collect::<Vec<_>>()
        .join("_");
    let slug = if slug.is_empty() { "participant".to_string() } else { slug };
    format!("tmt_{}_{}.csv", slug, at.format("%Y%m%d-%H%M%S"))
}

/// Destination for exported files
pub trait ExportSink {
    fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf, TmtError>;
}

/// Writes files into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct DirExportSink {
    pub dir: PathBuf,
}

impl DirExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for DirExportSink {
    fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf, TmtError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| TmtError::Export {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(name);
        std::fs::write(&path, contents).map_err(|source| TmtError::Export {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Keeps written files in memory, in write order
#[derive(Debug, Clone, Default)]
pub struct MemoryExportSink {
    pub files: Vec<(String, String)>,
}

impl MemoryExportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }
}

impl ExportSink for MemoryExportSink {
    fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf, TmtError> {
        self.files.push((name.to_string(), contents.to_string()));
        Ok(PathBuf::from(name))
    }
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub row: ExportRow,
    pub participant_file: PathBuf,
    pub cumulative_file: PathBuf,
    pub cumulative_rows: usize,
}

/// Writes the participant file, appends the row to the cumulative log and
/// rewrites the cumulative file from the whole log. Nothing is written when
/// the participant id is missing.
pub fn export_results<S, K>(
    participant_id: Option<&str>,
    results: &ResultsAggregate,
    config: &TmtConfig,
    sink: &mut S,
    store: &mut K,
    at: DateTime<Local>,
) -> Result<ExportSummary, TmtError>
where
    S: ExportSink + ?Sized,
    K: KeyValueStore + ?Sized,
{
    let participant_id = participant_id
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(TmtError::MissingParticipantId)?;

    let row = ExportRow::build(participant_id, results, at);
    let participant_file = sink.write_file(
        &participant_file_name(participant_id, at),
        &to_delimited(std::slice::from_ref(&row)),
    )?;

    let rows = CumulativeLog::new(store, &config.storage_key).append(row.clone())?;
    let cumulative_file = sink.write_file(&config.cumulative_file_name, &to_delimited(&rows))?;

    info!(
        participant = participant_id,
        file = %participant_file.display(),
        cumulative_rows = rows.len(),
        "results exported"
    );

    Ok(ExportSummary {
        row,
        participant_file,
        cumulative_file,
        cumulative_rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 10, 14, 5, 9).single().unwrap()
    }

    fn sample_results() -> ResultsAggregate {
        ResultsAggregate {
            practice_a: Some(TrialResult {
                duration_ms: 12345.0,
                errors: 1,
                n: 5,
            }),
            test_a: Some(TrialResult {
                duration_ms: 20000.0,
                errors: 0,
                n: 10,
            }),
            practice_b: None,
            test_b: None,
        }
    }

    #[test]
    fn row_formats_seconds_and_blanks_missing_trials() {
        let row = ExportRow::build("P007", &sample_results(), at());
        assert_eq!(row.participant_id, "P007");
        assert_eq!(row.pa_time_s, "12.3");
        assert_eq!(row.pa_errors, "1");
        assert_eq!(row.pa_n, "5");
        assert_eq!(row.ta_time_s, "20.0");
        assert_eq!(row.ta_errors, "0");
        assert_eq!(row.ta_n, "10");
        for cell in [
            &row.pb_time_s,
            &row.pb_errors,
            &row.pb_n,
            &row.tb_time_s,
            &row.tb_errors,
            &row.tb_n,
        ] {
            assert_eq!(cell, "");
        }
        assert_eq!(row.timestamp_local, "10/03/26 14:05:09");
        assert!(row.timestamp_iso.ends_with(".000Z"));
    }

    #[test]
    fn delimited_text_has_bom_header_and_crlf() {
        let row = ExportRow::build("P007", &sample_results(), at());
        let text = to_delimited(&[row]);
        assert!(text.starts_with('\u{feff}'));
        let body = text.trim_start_matches('\u{feff}');
        let lines: Vec<&str> = body.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER.join(";"));
        assert!(lines[1].starts_with("P007;"));
        assert!(lines[1].ends_with(";12.3;1;5;20.0;0;10;;;;;;"));
    }

    #[test]
    fn fields_with_delimiters_or_quotes_are_quoted() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a;b"), "\"a;b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn empty_row_list_is_empty_text() {
        assert_eq!(to_delimited(&[]), "");
    }

    #[test]
    fn file_name_uses_slug_and_stamp() {
        assert_eq!(participant_file_name("P007", at()), "tmt_p007_20260310-140509.csv");
        assert_eq!(participant_file_name("  ", at()), "tmt_participant_20260310-140509.csv");
    }

    #[test]
    fn file_name_keeps_underscores() {
        assert_eq!(participant_file_name("P_007", at()), "tmt_p_007_20260310-140509.csv");
        assert_eq!(
            participant_file_name("Jean Dupont_2", at()),
            "tmt_jean-dupont_2_20260310-140509.csv"
        );
    }

    #[test]
    fn seconds_round_halves_up() {
        assert_eq!(seconds(1250.0), "1.3");
        assert_eq!(seconds(250.0), "0.3");
        assert_eq!(seconds(12_345.0), "12.3");
        assert_eq!(seconds(1249.9), "1.2");
        assert_eq!(seconds(0.0), "0.0");
    }

    #[test]
    fn numeric_cells_deserialize_as_text() {
        let row: ExportRow = serde_json::from_str(
            r#"{"participant_id":"X","pA_errors":2,"pA_n":5,"pA_time_s":"3.0","tB_n":null}"#,
        )
        .unwrap();
        assert_eq!(row.pa_errors, "2");
        assert_eq!(row.pa_n, "5");
        assert_eq!(row.tb_n, "");
        assert_eq!(row.ta_time_s, "");
    }

    #[test]
    fn missing_participant_writes_nothing() {
        let mut sink = MemoryExportSink::new();
        let mut store = MemoryStore::new();
        let err = export_results(
            Some("   "),
            &sample_results(),
            &TmtConfig::default(),
            &mut sink,
            &mut store,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, TmtError::MissingParticipantId));
        assert!(sink.files.is_empty());
        assert!(store.get("TMT_RESULTS_V1").is_none());
    }

    #[test]
    fn cumulative_file_reflects_every_export() {
        let config = TmtConfig::default();
        let mut sink = MemoryExportSink::new();
        let mut store = MemoryStore::new();
        for pid in ["P001", "P002"] {
            export_results(Some(pid), &sample_results(), &config, &mut sink, &mut store, at())
                .unwrap();
        }
        assert_eq!(sink.files.len(), 4);
        let cumulative = sink.latest(&config.cumulative_file_name).unwrap();
        let lines: Vec<&str> = cumulative.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("P001;"));
        assert!(lines[2].starts_with("P002;"));
    }

    #[test]
    fn dir_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirExportSink::new(dir.path().join("out"));
        let path = sink.write_file("a.csv", "x").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x");
    }
}
