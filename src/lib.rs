pub mod analytics;
pub mod api;
pub mod category;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod model;
pub mod report;
pub mod scoring;

pub use category::{Band, BandPreset, BandSet, Severity};
pub use data::{StudentRecord, StudentTable};
pub use error::{AppError, Result};
pub use model::{FeatureVector, LinearModel, Regressor};
pub use scoring::{BatchReport, BatchRow, Scorer};
