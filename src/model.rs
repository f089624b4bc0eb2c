use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::StudentTable;
use crate::error::{AppError, Result};

pub const FEATURE_NAMES: [&str; 3] = ["avg_grade", "avg_attendance", "course_count"];

const GRADE_RANGE: (f64, f64) = (0.0, 100.0);
const ATTENDANCE_RANGE: (f64, f64) = (0.0, 16.0);
const COURSE_RANGE: (f64, f64) = (1.0, 40.0);

const MIN_FIT_ROWS: usize = 4;
// Determinant of the feature correlation matrix below which the design is
// treated as collinear.
const MIN_DESIGN_DETERMINANT: f64 = 1e-8;
// In-sample RMSE, in GPA points, above which a fit is rejected.
const MAX_FIT_RMSE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub avg_grade: f64,
    pub avg_attendance: f64,
    pub course_count: u32,
}

impl FeatureVector {
    // Only hand-entered values are checked; stored records are scored as-is
    pub fn validated(self) -> Result<Self> {
        check_range("avg_grade", self.avg_grade, GRADE_RANGE)?;
        check_range("avg_attendance", self.avg_attendance, ATTENDANCE_RANGE)?;
        check_range("course_count", f64::from(self.course_count), COURSE_RANGE)?;
        Ok(self)
    }

    pub fn to_row(&self) -> [f64; 3] {
        [self.avg_grade, self.avg_attendance, f64::from(self.course_count)]
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(AppError::InvalidFeature {
            field,
            value,
            min,
            max,
        })
    }
}

pub fn feature_matrix(features: &[FeatureVector]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = features.iter().flat_map(|f| f.to_row()).collect();
    Ok(Array2::from_shape_vec((features.len(), FEATURE_NAMES.len()), flat)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub algorithm: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub trained_at: Option<DateTime<Utc>>,
    pub metrics: Option<ModelMetrics>,
}

/// Scoring adapter: an n×3 feature table in canonical order goes in,
/// one GPA estimate per row comes out.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>>;

    fn info(&self) -> ModelInfo;

    fn predict_one(&self, features: &FeatureVector) -> Result<f64> {
        let matrix = feature_matrix(std::slice::from_ref(features))?;
        let predictions = self.predict(&matrix)?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| AppError::SchemaMismatch("model returned no prediction".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub algorithm: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ModelMetrics>,
}

impl LinearModel {
    pub fn new(coefficients: [f64; 3], intercept: f64) -> Self {
        Self {
            algorithm: "linear_regression".to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            coefficients: coefficients.to_vec(),
            intercept,
            trained_at: None,
            metrics: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::ModelNotFound(path.to_path_buf()));
        }

        let model = Self::from_json(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), algorithm = %model.algorithm, "loaded model artifact");
        Ok(model)
    }

    /// Coefficients are matched by name and reordered into `FEATURE_NAMES` order.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: LinearModel = serde_json::from_str(json)?;
        raw.into_canonical()
    }

    fn into_canonical(self) -> Result<Self> {
        if self.feature_names.len() != FEATURE_NAMES.len()
            || self.coefficients.len() != self.feature_names.len()
        {
            return Err(AppError::SchemaMismatch(format!(
                "expected {} named coefficients, got {} names and {} coefficients",
                FEATURE_NAMES.len(),
                self.feature_names.len(),
                self.coefficients.len()
            )));
        }

        let mut coefficients = Vec::with_capacity(FEATURE_NAMES.len());
        for name in FEATURE_NAMES {
            let position = self
                .feature_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| AppError::SchemaMismatch(format!("feature `{name}` missing")))?;
            coefficients.push(self.coefficients[position]);
        }

        Ok(Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            coefficients,
            ..self
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "wrote model artifact");
        Ok(())
    }

    pub fn evaluate(&self, features: &Array2<f64>, targets: &Array1<f64>) -> Result<ModelMetrics> {
        let predictions = self.predict(features)?;
        let errors = &predictions - targets;
        let samples = targets.len();
        if samples == 0 {
            return Ok(ModelMetrics {
                mae: 0.0,
                rmse: 0.0,
                samples,
            });
        }

        let n = samples as f64;
        Ok(ModelMetrics {
            mae: errors.mapv(f64::abs).sum() / n,
            rmse: (errors.mapv(|e| e * e).sum() / n).sqrt(),
            samples,
        })
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(AppError::SchemaMismatch(format!(
                "expected {} feature columns, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }
        let weights = Array1::from_vec(self.coefficients.clone());
        Ok(features.dot(&weights) + self.intercept)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            algorithm: self.algorithm.clone(),
            feature_names: self.feature_names.clone(),
            coefficients: self.coefficients.clone(),
            intercept: self.intercept,
            trained_at: self.trained_at,
            metrics: self.metrics,
        }
    }
}

pub fn labelled_rows(table: &StudentTable) -> Result<(Array2<f64>, Array1<f64>)> {
    let (features, targets): (Vec<FeatureVector>, Vec<f64>) = table
        .complete_rows()
        .into_iter()
        .filter_map(|(record, features)| record.gpa.map(|gpa| (features, gpa)))
        .unzip();
    Ok((feature_matrix(&features)?, Array1::from_vec(targets)))
}

fn det3(m: &Array2<f64>) -> f64 {
    m[[0, 0]] * (m[[1, 1]] * m[[2, 2]] - m[[1, 2]] * m[[2, 1]])
        - m[[0, 1]] * (m[[1, 0]] * m[[2, 2]] - m[[1, 2]] * m[[2, 0]])
        + m[[0, 2]] * (m[[1, 0]] * m[[2, 1]] - m[[1, 1]] * m[[2, 0]])
}

// OLS has no unique solution for a constant or collinear feature column.
fn check_design(features: &Array2<f64>) -> Result<()> {
    let means = features
        .mean_axis(Axis(0))
        .ok_or_else(|| AppError::Fit("no rows to fit".into()))?;
    let centered = features - &means;
    let scatter = centered.t().dot(&centered);
    let n = features.nrows() as f64;

    for (i, name) in FEATURE_NAMES.iter().enumerate() {
        let variance = scatter[[i, i]] / n;
        if !(variance > 1e-12) {
            return Err(AppError::Fit(format!("feature `{name}` has no variance")));
        }
    }

    let scale = scatter.diag().mapv(f64::sqrt);
    let correlation = Array2::from_shape_fn((3, 3), |(i, j)| scatter[[i, j]] / (scale[i] * scale[j]));
    let determinant = det3(&correlation);
    if !(determinant > MIN_DESIGN_DETERMINANT) {
        return Err(AppError::Fit(format!(
            "features are collinear (correlation determinant {determinant:.2e})"
        )));
    }
    Ok(())
}

pub fn fit(table: &StudentTable) -> Result<LinearModel> {
    let (features, targets) = labelled_rows(table)?;
    if features.nrows() < MIN_FIT_ROWS {
        return Err(AppError::Fit(format!(
            "need at least {MIN_FIT_ROWS} rows with features and GPA, found {}",
            features.nrows()
        )));
    }

    check_design(&features)?;

    debug!(rows = features.nrows(), "fitting linear regression");
    let dataset = Dataset::new(features.clone(), targets.clone());
    let fitted = LinearRegression::new()
        .fit(&dataset)
        .map_err(|e| AppError::Fit(e.to_string()))?;

    let params = fitted.params();
    let mut model = LinearModel::new([params[0], params[1], params[2]], fitted.intercept());
    if !model.coefficients.iter().all(|c| c.is_finite()) || !model.intercept.is_finite() {
        return Err(AppError::Fit("solver produced non-finite parameters".into()));
    }
    model.trained_at = Some(Utc::now());
    let metrics = model.evaluate(&features, &targets)?;
    if !(metrics.rmse <= MAX_FIT_RMSE) {
        return Err(AppError::Fit(format!(
            "in-sample RMSE {:.3} exceeds {MAX_FIT_RMSE}",
            metrics.rmse
        )));
    }
    info!(mae = metrics.mae, rmse = metrics.rmse, samples = metrics.samples, "model fitted");
    model.metrics = Some(metrics);
    Ok(model)
}
