use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::model::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
    AvgGrade,
    AvgAttendance,
    CourseCount,
    Gpa,
}

impl Column {
    pub fn canonical(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Name => "name",
            Column::AvgGrade => "avg_grade",
            Column::AvgAttendance => "avg_attendance",
            Column::CourseCount => "course_count",
            Column::Gpa => "gpa",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Id => &["nim", "id", "studentid", "nomorindukmahasiswa"],
            Column::Name => &["nama", "name", "studentname", "namamahasiswa"],
            Column::AvgGrade => &["rata2nilai", "rataratanilai", "avggrade", "averagegrade", "nilai"],
            Column::AvgAttendance => &[
                "rata2hadir",
                "rataratahadir",
                "avgattendance",
                "averageattendance",
                "attendance",
                "kehadiran",
            ],
            Column::CourseCount => &[
                "jumlahmkdiambil",
                "jumlahmk",
                "coursecount",
                "courses",
                "numcourses",
            ],
            Column::Gpa => &["ipk", "gpa", "actualgpa"],
        }
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// Aliases are tried in priority order, not header order
fn find_column<'a>(headers: impl IntoIterator<Item = &'a str>, column: Column) -> Option<usize> {
    let normalized: Vec<String> = headers.into_iter().map(normalize_header).collect();
    column
        .aliases()
        .iter()
        .find_map(|alias| normalized.iter().position(|h| h == alias))
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    id: usize,
    name: Option<usize>,
    avg_grade: Option<usize>,
    avg_attendance: Option<usize>,
    course_count: Option<usize>,
    gpa: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let id = find_column(headers, Column::Id)
            .ok_or_else(|| AppError::MissingColumn(Column::Id.canonical().to_string()))?;

        let map = Self {
            id,
            name: find_column(headers, Column::Name),
            avg_grade: find_column(headers, Column::AvgGrade),
            avg_attendance: find_column(headers, Column::AvgAttendance),
            course_count: find_column(headers, Column::CourseCount),
            gpa: find_column(headers, Column::Gpa),
        };

        for (column, index) in [
            (Column::AvgGrade, map.avg_grade),
            (Column::AvgAttendance, map.avg_attendance),
            (Column::CourseCount, map.course_count),
        ] {
            if index.is_none() {
                warn!(column = column.canonical(), "feature column missing from dataset");
            }
        }

        Ok(map)
    }
}

fn cell<'a>(record: &'a StringRecord, index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| record.get(i))
        .filter(|value| !value.is_empty())
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_count(value: Option<&str>) -> Option<u32> {
    parse_number(value)
        .filter(|v| *v >= 1.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: Option<String>,
    pub avg_grade: Option<f64>,
    pub avg_attendance: Option<f64>,
    pub course_count: Option<u32>,
    pub gpa: Option<f64>,
}

impl StudentRecord {
    fn from_row(row: &StringRecord, columns: &ColumnMap) -> Self {
        Self {
            id: row.get(columns.id).unwrap_or_default().to_string(),
            name: cell(row, columns.name).map(str::to_string),
            avg_grade: parse_number(cell(row, columns.avg_grade)),
            avg_attendance: parse_number(cell(row, columns.avg_attendance)),
            course_count: parse_count(cell(row, columns.course_count)),
            gpa: parse_number(cell(row, columns.gpa)),
        }
    }

    pub fn features(&self) -> Result<FeatureVector> {
        let missing = |field: &'static str| AppError::MissingValue {
            id: self.id.clone(),
            field,
        };

        Ok(FeatureVector {
            avg_grade: self.avg_grade.ok_or_else(|| missing("avg_grade"))?,
            avg_attendance: self.avg_attendance.ok_or_else(|| missing("avg_attendance"))?,
            course_count: self.course_count.ok_or_else(|| missing("course_count"))?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentTable {
    records: Vec<StudentRecord>,
}

impl StudentTable {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::DatasetNotFound(path.to_path_buf()));
        }

        let table = Self::from_reader(File::open(path)?)?;
        info!(path = %path.display(), records = table.len(), "loaded student dataset");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);
        let columns = ColumnMap::resolve(rdr.headers()?)?;

        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result?;
            records.push(StudentRecord::from_row(&row, &columns));
        }

        let incomplete = records.iter().filter(|r| r.features().is_err()).count();
        if incomplete > 0 {
            debug!(incomplete, "rows with missing or unparseable features");
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    // Duplicates are not rejected; the first row wins.
    pub fn find(&self, id: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn get(&self, id: &str) -> Result<&StudentRecord> {
        self.find(id)
            .ok_or_else(|| AppError::StudentNotFound(id.to_string()))
    }

    pub fn complete_rows(&self) -> Vec<(&StudentRecord, FeatureVector)> {
        self.records
            .iter()
            .filter_map(|record| record.features().ok().map(|f| (record, f)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Csv,
    Spreadsheet,
}

impl BatchFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => BatchFormat::Spreadsheet,
            _ => BatchFormat::Csv,
        }
    }

    pub fn from_content_type(content_type: &str) -> Self {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.ms-excel.sheet.macroenabled.12"
            | "application/vnd.ms-excel.sheet.binary.macroenabled.12"
            | "application/vnd.oasis.opendocument.spreadsheet" => BatchFormat::Spreadsheet,
            _ => BatchFormat::Csv,
        }
    }
}

pub fn read_batch_ids(bytes: &[u8], format: BatchFormat) -> Result<Vec<String>> {
    match format {
        BatchFormat::Csv => read_ids(bytes),
        BatchFormat::Spreadsheet => read_ids_xlsx(Cursor::new(bytes)),
    }
}

// Blank identifiers are kept so the output stays aligned with the upload.
pub fn read_ids<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let id_index = find_column(rdr.headers()?, Column::Id)
        .ok_or_else(|| AppError::MissingColumn(Column::Id.canonical().to_string()))?;

    let mut ids = Vec::new();
    for result in rdr.records() {
        let row = result?;
        ids.push(row.get(id_index).unwrap_or_default().to_string());
    }
    Ok(ids)
}

/// Identifier column of the first worksheet of an Excel/ODS workbook.
/// Numeric cells are rendered without a trailing `.0`.
pub fn read_ids_xlsx<RS: Read + Seek + Clone>(reader: RS) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto_from_rs(reader)?;
    let range = workbook.worksheet_range_at(0).ok_or(AppError::EmptyWorkbook)??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(AppError::MissingColumn(Column::Id.canonical().to_string()));
    };
    let headers: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();
    let id_index = find_column(headers.iter().map(String::as_str), Column::Id)
        .ok_or_else(|| AppError::MissingColumn(Column::Id.canonical().to_string()))?;

    Ok(rows
        .map(|row| {
            row.get(id_index)
                .map(|cell| cell.to_string().trim().to_string())
                .unwrap_or_default()
        })
        .collect())
}
