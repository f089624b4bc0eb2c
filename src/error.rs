use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("dataset file not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("student `{0}` not found")]
    StudentNotFound(String),

    #[error("column `{0}` not found")]
    MissingColumn(String),

    #[error("student `{id}` has no usable value for `{field}`")]
    MissingValue { id: String, field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    InvalidFeature {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid band set: {0}")]
    InvalidBands(String),

    #[error("model schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("model fitting failed: {0}")]
    Fit(String),

    #[error("workbook has no worksheet")]
    EmptyWorkbook,

    #[error("unreadable spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::StudentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::MissingColumn(_)
            | AppError::MissingValue { .. }
            | AppError::InvalidFeature { .. }
            | AppError::Csv(_)
            | AppError::EmptyWorkbook
            | AppError::Spreadsheet(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_miss_maps_to_404() {
        let err = AppError::StudentNotFound("42".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "student `42` not found");
    }

    #[test]
    fn bad_input_maps_to_400() {
        let err = AppError::InvalidFeature {
            field: "avg_grade",
            value: 120.0,
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingColumn("NIM".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::EmptyWorkbook.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_artifacts_are_server_errors() {
        let err = AppError::ModelNotFound(PathBuf::from("data/model.json"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("data/model.json"));
    }
}
