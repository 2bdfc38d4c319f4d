//! Entries to and from CSV text.
//!
//! Columns are matched by header name. A fixed column missing from the header
//! falls back to its position (id, course, year, month, participants); when no
//! question id appears in the header at all, question columns are read
//! positionally from index 5 in schema order.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{new_entry_id, Entry, Scale};

pub const DEFAULT_FILE_NAME: &str = "survey-entries.csv";

const FIXED_COLUMNS: [&str; 5] = ["id", "course", "year", "month", "participants"];

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to write CSV")]
    Write(#[from] csv::Error),
    #[error("CSV output was not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to flush CSV writer")]
    Flush(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
    #[error("failed to read CSV line {line}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub entries: Vec<Entry>,
    pub skipped: Vec<SkippedRow>,
}

pub fn encode(entries: &[Entry], question_ids: &[String]) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
    header.extend(question_ids.iter().map(String::as_str));
    writer.write_record(&header)?;

    for entry in entries {
        let mut row = vec![
            entry.id.clone(),
            entry.course.clone(),
            entry.year.to_string(),
            entry.month.to_string(),
            entry.participants.to_string(),
        ];
        row.extend(
            question_ids
                .iter()
                .map(|id| entry.score(id).map(|s| s.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

struct ColumnMap {
    fixed: [usize; 5],
    questions: Vec<(String, usize)>,
}

impl ColumnMap {
    fn from_header(header: &csv::StringRecord, question_ids: &[String]) -> Self {
        let position = |name: &str| {
            header
                .iter()
                .position(|field| field.trim().eq_ignore_ascii_case(name))
        };

        let mut fixed = [0, 1, 2, 3, 4];
        for (slot, name) in fixed.iter_mut().zip(FIXED_COLUMNS) {
            if let Some(index) = position(name) {
                *slot = index;
            }
        }

        let named: Vec<(String, usize)> = question_ids
            .iter()
            .filter_map(|id| position(id).map(|index| (id.clone(), index)))
            .collect();

        let questions = if named.is_empty() {
            debug!("No question ids in CSV header, reading score columns by position");
            question_ids
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), FIXED_COLUMNS.len() + i))
                .collect()
        } else {
            named
        };

        Self { fixed, questions }
    }
}

/// Parses CSV text into entries. Rows with an unusable year, month or
/// participant count are skipped and reported; the rest of the file is
/// still imported. Scores are clamped into `scale`.
pub fn decode(text: &str, question_ids: &[String], scale: Scale) -> Result<Decoded, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map_err(|source| CsvError::Read { line: 1, source })?
        .clone();
    let columns = ColumnMap::from_header(&header, question_ids);

    let mut decoded = Decoded::default();
    for result in reader.records() {
        let record = result.map_err(|source| CsvError::Read {
            line: source.position().map_or(0, |p| p.line()),
            source,
        })?;
        let line = record.position().map_or(0, |p| p.line());

        if record.iter().all(str::is_empty) {
            continue;
        }

        match decode_row(&record, &columns, scale) {
            Ok(entry) => decoded.entries.push(entry),
            Err(reason) => {
                warn!("Skipping CSV line {line}: {reason}");
                decoded.skipped.push(SkippedRow { line, reason });
            }
        }
    }

    Ok(decoded)
}

fn decode_row(
    record: &csv::StringRecord,
    columns: &ColumnMap,
    scale: Scale,
) -> Result<Entry, String> {
    let field = |index: usize| record.get(index).unwrap_or("");
    let [id_col, course_col, year_col, month_col, participants_col] = columns.fixed;

    let year: i32 = field(year_col)
        .parse()
        .map_err(|_| format!("invalid year {:?}", field(year_col)))?;
    let month: u32 = field(month_col)
        .parse()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| format!("invalid month {:?}", field(month_col)))?;
    let participants: u32 = field(participants_col)
        .parse()
        .map_err(|_| format!("invalid participants {:?}", field(participants_col)))?;

    let id = match field(id_col) {
        "" => new_entry_id(),
        id => id.to_string(),
    };

    let scores: BTreeMap<String, Option<f64>> = columns
        .questions
        .iter()
        .map(|(question_id, index)| {
            let score = field(*index)
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite())
                .map(|s| scale.clamp(s));
            (question_id.clone(), score)
        })
        .collect();

    Ok(Entry {
        id,
        course: field(course_col).to_string(),
        year,
        month,
        participants,
        scores,
    })
}
