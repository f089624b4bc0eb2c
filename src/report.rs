use std::io::{Read, Write};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scoring::{BatchRow, NOT_FOUND_LABEL};

const PLACEHOLDER: &str = "-";

const HEADERS: [&str; 8] = [
    "id",
    "name",
    "avg_grade",
    "avg_attendance",
    "course_count",
    "predicted_gpa",
    "category",
    "advisory",
];

// Field order must match HEADERS
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: String,
    name: String,
    avg_grade: String,
    avg_attendance: String,
    course_count: String,
    predicted_gpa: String,
    category: String,
    advisory: String,
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or(PLACEHOLDER).to_string()
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{v:.2}"))
}

fn optional(value: &str) -> Option<&str> {
    (value != PLACEHOLDER && !value.is_empty()).then_some(value)
}

impl From<&BatchRow> for CsvRow {
    fn from(row: &BatchRow) -> Self {
        Self {
            id: row.id.clone(),
            name: text(row.name.as_deref()),
            avg_grade: number(row.avg_grade),
            avg_attendance: number(row.avg_attendance),
            course_count: row
                .course_count
                .map_or_else(|| PLACEHOLDER.to_string(), |c| c.to_string()),
            predicted_gpa: number(row.predicted_gpa),
            category: row.category.clone(),
            advisory: text(row.advisory.as_deref()),
        }
    }
}

impl From<CsvRow> for BatchRow {
    fn from(row: CsvRow) -> Self {
        Self {
            found: row.category != NOT_FOUND_LABEL,
            name: optional(&row.name).map(str::to_string),
            avg_grade: optional(&row.avg_grade).and_then(|v| v.parse().ok()),
            avg_attendance: optional(&row.avg_attendance).and_then(|v| v.parse().ok()),
            course_count: optional(&row.course_count).and_then(|v| v.parse().ok()),
            predicted_gpa: optional(&row.predicted_gpa).and_then(|v| v.parse().ok()),
            advisory: optional(&row.advisory).map(str::to_string),
            id: row.id,
            category: row.category,
        }
    }
}

pub fn write_batch_csv<W: Write>(rows: &[BatchRow], writer: W) -> Result<()> {
    // Header is written up front so an empty batch still yields a valid file
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.serialize(CsvRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn batch_csv_string(rows: &[BatchRow]) -> Result<String> {
    let mut buffer = Vec::new();
    write_batch_csv(rows, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Numbers come back rounded to two decimals
pub fn read_batch_csv<R: Read>(reader: R) -> Result<Vec<BatchRow>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize::<CsvRow>() {
        rows.push(BatchRow::from(result?));
    }
    Ok(rows)
}
