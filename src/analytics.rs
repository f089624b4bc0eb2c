use serde::Serialize;

use crate::category::Severity;
use crate::error::Result;
use crate::model::{feature_matrix, FeatureVector, ModelMetrics};
use crate::scoring::Scorer;

#[derive(Serialize, Clone)]
pub struct AnalyticsData {
    pub total_students: usize,
    pub complete_records: usize,
    pub avg_grade: Option<f64>,
    pub avg_attendance: Option<f64>,
    pub avg_course_count: Option<f64>,
    pub avg_actual_gpa: Option<f64>,
    pub avg_predicted_gpa: Option<f64>,
    pub performance_breakdown: Vec<PerformanceCategory>,
    pub model_error: Option<ModelMetrics>,
    pub chart_data: ChartData,
}

#[derive(Serialize, Clone)]
pub struct PerformanceCategory {
    pub label: String,
    pub severity: Severity,
    pub lower_bound: Option<f64>,
    pub count: usize,
    pub share: f64,
}

// Series ready for a bar chart (bands) and a scatter plot (GPA points)
#[derive(Serialize, Clone)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
    pub points: Vec<GpaPoint>,
}

#[derive(Serialize, Clone)]
pub struct GpaPoint {
    pub id: String,
    pub predicted: f64,
    pub actual: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn analyze(scorer: &Scorer) -> Result<AnalyticsData> {
    let table = scorer.table();
    let rows = table.complete_rows();
    let features: Vec<FeatureVector> = rows.iter().map(|(_, f)| *f).collect();
    let predictions = scorer.model().predict(&feature_matrix(&features)?)?;

    let points: Vec<GpaPoint> = rows
        .iter()
        .zip(predictions.iter())
        .map(|((record, _), &predicted)| GpaPoint {
            id: record.id.clone(),
            predicted,
            actual: record.gpa,
        })
        .collect();

    let complete = points.len();
    let performance_breakdown: Vec<PerformanceCategory> = scorer
        .bands()
        .bands()
        .iter()
        .map(|band| {
            let count = points
                .iter()
                .filter(|p| scorer.bands().categorize(p.predicted).label == band.label)
                .count();
            PerformanceCategory {
                label: band.label.clone(),
                severity: band.severity,
                lower_bound: band.lower_bound,
                count,
                share: if complete > 0 { count as f64 / complete as f64 } else { 0.0 },
            }
        })
        .collect();

    let errors: Vec<f64> = points
        .iter()
        .filter_map(|p| p.actual.map(|actual| p.predicted - actual))
        .collect();
    let model_error = (!errors.is_empty()).then(|| ModelMetrics {
        mae: errors.iter().map(|e| e.abs()).sum::<f64>() / errors.len() as f64,
        rmse: (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt(),
        samples: errors.len(),
    });

    let records = table.records();
    let chart_data = ChartData {
        labels: performance_breakdown.iter().map(|c| c.label.clone()).collect(),
        counts: performance_breakdown.iter().map(|c| c.count).collect(),
        points,
    };

    Ok(AnalyticsData {
        total_students: records.len(),
        complete_records: complete,
        avg_grade: mean(records.iter().filter_map(|r| r.avg_grade)),
        avg_attendance: mean(records.iter().filter_map(|r| r.avg_attendance)),
        avg_course_count: mean(records.iter().filter_map(|r| r.course_count.map(f64::from))),
        avg_actual_gpa: mean(records.iter().filter_map(|r| r.gpa)),
        avg_predicted_gpa: mean(predictions.iter().copied()),
        performance_breakdown,
        model_error,
        chart_data,
    })
}
