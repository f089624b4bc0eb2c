use std::path::PathBuf;

use clap::Args;

use crate::category::{BandPreset, BandSet};
use crate::data::StudentTable;
use crate::error::Result;
use crate::model::LinearModel;
use crate::scoring::Scorer;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Student dataset (CSV)
    #[arg(long, env = "GPA_DATA_PATH", default_value = "data/students.csv", global = true)]
    pub data_path: PathBuf,

    /// Model artifact (JSON)
    #[arg(long, env = "GPA_MODEL_PATH", default_value = "data/model.json", global = true)]
    pub model_path: PathBuf,

    /// GPA threshold set used for categorization
    #[arg(long, env = "GPA_BANDS", value_enum, default_value_t = BandPreset::Classic, global = true)]
    pub bands: BandPreset,
}

impl Settings {
    pub fn load_scorer(&self) -> Result<Scorer> {
        let model = LinearModel::load(&self.model_path)?;
        let table = StudentTable::load(&self.data_path)?;
        Ok(Scorer::new(table, Box::new(model), BandSet::preset(self.bands)))
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServerSettings {
    #[arg(long, env = "GPA_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(long, env = "GPA_PORT", default_value_t = 8080)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            data_path: dir.join("students.csv"),
            model_path: dir.join("model.json"),
            bands: BandPreset::Predicate,
        }
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("students.csv"), "nim\n1\n").unwrap();
        assert!(matches!(
            settings(dir.path()).load_scorer(),
            Err(AppError::ModelNotFound(_))
        ));
    }

    #[test]
    fn missing_dataset_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        LinearModel::new([0.04, 0.0, 0.0], 0.0)
            .save(dir.path().join("model.json"))
            .unwrap();
        assert!(matches!(
            settings(dir.path()).load_scorer(),
            Err(AppError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn loads_scorer_with_selected_bands() {
        let dir = tempfile::tempdir().unwrap();
        LinearModel::new([0.04, 0.0, 0.0], 0.0)
            .save(dir.path().join("model.json"))
            .unwrap();
        std::fs::write(
            dir.path().join("students.csv"),
            "nim,rata2_nilai,rata2_hadir,jumlah_mk_diambil\n1,90,15,8\n",
        )
        .unwrap();

        let scorer = settings(dir.path()).load_scorer().unwrap();
        assert_eq!(scorer.bands().name(), "predicate");
        assert_eq!(scorer.lookup("1").unwrap().category.label, "WITH HONORS");
    }
}
