use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use gpa_predictor::analytics;
use gpa_predictor::api::start_api;
use gpa_predictor::config::{ServerSettings, Settings};
use gpa_predictor::data::{read_batch_ids, BatchFormat, StudentTable};
use gpa_predictor::model;
use gpa_predictor::report::write_batch_csv;
use gpa_predictor::{logging, FeatureVector, Result};

#[derive(Parser)]
#[command(name = "gpa-predictor")]
#[command(about = "Student GPA lookup, prediction and batch scoring", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[command(flatten)]
        server: ServerSettings,
    },
    /// Look up a student by identifier and predict their GPA
    Lookup { id: String },
    /// Predict a GPA from raw feature values
    Predict {
        #[arg(long)]
        grade: f64,
        #[arg(long)]
        attendance: f64,
        #[arg(long)]
        courses: u32,
    },
    /// Score every identifier in a CSV or Excel file
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Write the result table as CSV
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fit a linear model on dataset rows that carry an actual GPA
    Fit {
        /// Defaults to the configured model path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarize the dataset and model error
    Analytics,
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings;

    match cli.command {
        Commands::Serve { server } => {
            let scorer = settings.load_scorer()?;
            start_api(scorer, &server).await?;
        }
        Commands::Lookup { id } => {
            let scorer = settings.load_scorer()?;
            let assessment = scorer.lookup(id.trim())?;
            let student = &assessment.student;
            println!("Student {}", student.id);
            if let Some(name) = &student.name {
                println!("  Name:            {name}");
            }
            let features = student.features()?;
            println!("  Avg grade:       {:.2}", features.avg_grade);
            println!("  Avg attendance:  {:.2}", features.avg_attendance);
            println!("  Courses taken:   {}", features.course_count);
            if let Some(gpa) = student.gpa {
                println!("  Actual GPA:      {gpa:.2}");
            }
            println!("Predicted GPA {:.2}: {}", assessment.predicted_gpa, assessment.category.label);
            println!("  {}", assessment.category.advisory);
        }
        Commands::Predict {
            grade,
            attendance,
            courses,
        } => {
            let scorer = settings.load_scorer()?;
            let response = scorer.predict(FeatureVector {
                avg_grade: grade,
                avg_attendance: attendance,
                course_count: courses,
            })?;
            println!("Predicted GPA {:.2}: {}", response.predicted_gpa, response.category.label);
            println!("  {}", response.category.advisory);
        }
        Commands::Batch { input, output } => {
            let scorer = settings.load_scorer()?;
            let ids = read_batch_ids(&fs::read(&input)?, BatchFormat::from_path(&input))?;
            let report = scorer.score_batch(&ids);

            for row in &report.rows {
                match row.predicted_gpa {
                    Some(gpa) => println!("- {} predicted {:.2} ({})", row.id, gpa, row.category),
                    None => println!("- {} {}", row.id, row.category),
                }
            }
            let summary = &report.summary;
            println!(
                "Scored {} of {} students ({} not found).",
                summary.found, report.total_students, summary.not_found
            );
            for category in &summary.categories {
                println!("  {}: {}", category.label, category.count);
            }

            if let Some(output) = output {
                write_batch_csv(&report.rows, File::create(&output)?)?;
                println!("Results written to {}.", output.display());
            }
        }
        Commands::Fit { output } => {
            let table = StudentTable::load(&settings.data_path)?;
            let fitted = model::fit(&table)?;
            let path = output.unwrap_or(settings.model_path);
            fitted.save(&path)?;
            if let Some(metrics) = fitted.metrics {
                println!(
                    "Fitted on {} rows: MAE {:.3}, RMSE {:.3}",
                    metrics.samples, metrics.mae, metrics.rmse
                );
            }
            println!("Model written to {}.", path.display());
        }
        Commands::Analytics => {
            let scorer = settings.load_scorer()?;
            let data = analytics::analyze(&scorer)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
