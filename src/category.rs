use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

// `lower_bound` is inclusive; `None` may only appear on the last band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower_bound: Option<f64>,
    pub label: String,
    pub severity: Severity,
    pub advisory: String,
}

impl Band {
    pub fn new(lower_bound: Option<f64>, label: &str, severity: Severity, advisory: &str) -> Self {
        Self {
            lower_bound,
            label: label.to_string(),
            severity,
            advisory: advisory.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandPreset {
    /// 3.4 / 3.0, three bands
    #[default]
    Classic,
    /// 3.51 / 3.01 / 2.76, four bands following graduation predicates
    Predicate,
    /// 3.7 / 3.0, three bands used by the manual feature form
    Slider,
}

impl fmt::Display for BandPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BandPreset::Classic => "classic",
            BandPreset::Predicate => "predicate",
            BandPreset::Slider => "slider",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSet {
    name: String,
    bands: Vec<Band>,
}

impl BandSet {
    /// Bands are ordered highest first with strictly descending finite
    /// lower bounds; only the last one is unbounded.
    pub fn new(name: impl Into<String>, bands: Vec<Band>) -> Result<Self> {
        let Some((last, bounded)) = bands.split_last() else {
            return Err(AppError::InvalidBands("at least one band is required".into()));
        };
        if last.lower_bound.is_some() {
            return Err(AppError::InvalidBands(format!(
                "lowest band `{}` must not have a lower bound",
                last.label
            )));
        }

        let mut previous: Option<f64> = None;
        for band in bounded {
            let Some(bound) = band.lower_bound else {
                return Err(AppError::InvalidBands(format!(
                    "band `{}` is unbounded but not last",
                    band.label
                )));
            };
            if !bound.is_finite() {
                return Err(AppError::InvalidBands(format!(
                    "band `{}` has a non-finite lower bound",
                    band.label
                )));
            }
            if previous.is_some_and(|p| bound >= p) {
                return Err(AppError::InvalidBands(format!(
                    "band `{}` lower bound {bound} is not below the previous band",
                    band.label
                )));
            }
            previous = Some(bound);
        }

        Ok(Self {
            name: name.into(),
            bands,
        })
    }

    pub fn preset(preset: BandPreset) -> Self {
        let bands = match preset {
            BandPreset::Classic => vec![
                Band::new(
                    Some(3.4),
                    "SUCCESSFUL",
                    Severity::Success,
                    "Grade and attendance patterns show consistent learning participation.",
                ),
                Band::new(
                    Some(3.0),
                    "FAIRLY SUCCESSFUL",
                    Severity::Warning,
                    "Attendance and participation are moderate. Further support and monitoring is needed.",
                ),
                Band::new(
                    None,
                    "LESS SUCCESSFUL",
                    Severity::Error,
                    "Needs more attention to participation, attendance, or an overly heavy course load.",
                ),
            ],
            BandPreset::Predicate => vec![
                Band::new(
                    Some(3.51),
                    "WITH HONORS",
                    Severity::Success,
                    "Outstanding and consistent performance. Keep the current study pattern.",
                ),
                Band::new(
                    Some(3.01),
                    "VERY SATISFACTORY",
                    Severity::Info,
                    "Solid performance. Small gains in attendance can lift the result further.",
                ),
                Band::new(
                    Some(2.76),
                    "SATISFACTORY",
                    Severity::Warning,
                    "Adequate performance. Regular monitoring and academic support are advised.",
                ),
                Band::new(
                    None,
                    "NEEDS ATTENTION",
                    Severity::Error,
                    "At risk. Review attendance, participation and course load with an advisor.",
                ),
            ],
            BandPreset::Slider => vec![
                Band::new(
                    Some(3.7),
                    "VERY SATISFACTORY",
                    Severity::Success,
                    "Excellent predicted result.",
                ),
                Band::new(Some(3.0), "FAIRLY GOOD", Severity::Info, "Reasonable predicted result."),
                Band::new(
                    None,
                    "NEEDS ATTENTION",
                    Severity::Warning,
                    "Predicted result calls for closer attention.",
                ),
            ],
        };

        Self {
            name: preset.to_string(),
            bands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn lowest(&self) -> &Band {
        &self.bands[self.bands.len() - 1]
    }

    // NaN meets no bound and lands in the lowest band
    pub fn categorize(&self, score: f64) -> &Band {
        self.bands
            .iter()
            .find(|band| band.lower_bound.map_or(true, |bound| score >= bound))
            .unwrap_or_else(|| self.lowest())
    }
}

impl Default for BandSet {
    fn default() -> Self {
        Self::preset(BandPreset::default())
    }
}
