use serde::Serialize;
use tracing::{debug, warn};

use crate::category::{Band, BandSet};
use crate::data::{StudentRecord, StudentTable};
use crate::error::Result;
use crate::model::{FeatureVector, Regressor};

pub const NOT_FOUND_LABEL: &str = "NOT FOUND";

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub features: FeatureVector,
    pub predicted_gpa: f64,
    pub category: Band,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentAssessment {
    pub student: StudentRecord,
    pub predicted_gpa: f64,
    pub category: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub id: String,
    pub name: Option<String>,
    pub avg_grade: Option<f64>,
    pub avg_attendance: Option<f64>,
    pub course_count: Option<u32>,
    pub predicted_gpa: Option<f64>,
    pub category: String,
    pub advisory: Option<String>,
    pub found: bool,
}

impl BatchRow {
    pub fn not_found(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            avg_grade: None,
            avg_attendance: None,
            course_count: None,
            predicted_gpa: None,
            category: NOT_FOUND_LABEL.to_string(),
            advisory: None,
            found: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub found: usize,
    pub not_found: usize,
    pub avg_predicted_gpa: Option<f64>,
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_students: usize,
    pub rows: Vec<BatchRow>,
    pub summary: BatchSummary,
}

pub struct Scorer {
    table: StudentTable,
    model: Box<dyn Regressor>,
    bands: BandSet,
}

impl Scorer {
    pub fn new(table: StudentTable, model: Box<dyn Regressor>, bands: BandSet) -> Self {
        Self { table, model, bands }
    }

    pub fn table(&self) -> &StudentTable {
        &self.table
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }

    fn score(&self, features: &FeatureVector) -> Result<(f64, &Band)> {
        let predicted = self.model.predict_one(features)?;
        Ok((predicted, self.bands.categorize(predicted)))
    }

    pub fn predict(&self, features: FeatureVector) -> Result<PredictResponse> {
        let features = features.validated()?;
        let (predicted_gpa, band) = self.score(&features)?;
        debug!(predicted_gpa, category = %band.label, "scored manual input");
        Ok(PredictResponse {
            features,
            predicted_gpa,
            category: band.clone(),
        })
    }

    pub fn lookup(&self, id: &str) -> Result<StudentAssessment> {
        let student = self.table.get(id)?;
        let (predicted_gpa, band) = self.score(&student.features()?)?;
        debug!(id, predicted_gpa, category = %band.label, "scored student");
        Ok(StudentAssessment {
            student: student.clone(),
            predicted_gpa,
            category: band.clone(),
        })
    }

    fn score_row(&self, id: &str) -> Result<BatchRow> {
        let student = self.table.get(id)?;
        let features = student.features()?;
        let (predicted_gpa, band) = self.score(&features)?;
        Ok(BatchRow {
            id: id.to_string(),
            name: student.name.clone(),
            avg_grade: Some(features.avg_grade),
            avg_attendance: Some(features.avg_attendance),
            course_count: Some(features.course_count),
            predicted_gpa: Some(predicted_gpa),
            category: band.label.clone(),
            advisory: Some(band.advisory.clone()),
            found: true,
        })
    }

    /// One row per input identifier, in input order. Any row failure
    /// becomes a not-found placeholder; the batch itself never fails.
    pub fn score_batch<S: AsRef<str>>(&self, ids: &[S]) -> BatchReport {
        let rows: Vec<BatchRow> = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                self.score_row(id).unwrap_or_else(|err| {
                    warn!(id, error = %err, "batch row not scored");
                    BatchRow::not_found(id)
                })
            })
            .collect();

        let summary = self.summarize(&rows);
        BatchReport {
            total_students: rows.len(),
            rows,
            summary,
        }
    }

    fn summarize(&self, rows: &[BatchRow]) -> BatchSummary {
        let predicted: Vec<f64> = rows.iter().filter_map(|r| r.predicted_gpa).collect();
        let found = predicted.len();
        let avg_predicted_gpa = if found > 0 {
            Some(predicted.iter().sum::<f64>() / found as f64)
        } else {
            None
        };

        let categories = self
            .bands
            .bands()
            .iter()
            .map(|band| CategoryCount {
                label: band.label.clone(),
                count: rows.iter().filter(|r| r.found && r.category == band.label).count(),
            })
            .collect();

        BatchSummary {
            found,
            not_found: rows.len() - found,
            avg_predicted_gpa,
            categories,
        }
    }
}
