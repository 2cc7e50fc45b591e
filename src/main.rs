use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use activity_converter::app::convert_use_case::ConvertUseCase;
use activity_converter::infra::ndjson_output_adapter::NdjsonOutputAdapter;
use activity_converter::infra::payload_reader::read_payload;
use activity_converter::{logging, observability, BatchSummary, Converter, ConverterConfig};

#[derive(Parser)]
#[command(name = "activity_converter")]
#[command(about = "Converts extracted family-activity listings into reviewable activities")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file; overrides ACTIVITY_CONVERTER_CONFIG and ./converter.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert extraction payloads and write NDJSON activities and diagnostics
    Convert {
        /// Payload JSON files, one per source
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Print the outcomes for one payload as JSON without writing files
    Inspect {
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    observability::metrics::describe_all();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::from_env()?,
    };
    let converter = Converter::new(config);

    match cli.command {
        Commands::Convert { input, output_dir } => {
            let mut sources = Vec::new();
            for path in &input {
                match read_payload(path) {
                    Ok(source) => sources.push(source),
                    Err(e) => error!("Skipping {}: {}", path.display(), e),
                }
            }

            let output = NdjsonOutputAdapter::new(&output_dir)?;
            let use_case = ConvertUseCase::new(converter, Box::new(output));
            let reports = use_case.convert_sources(sources).await?;

            for report in &reports {
                print_summary(&report.source_id, &report.summary);
            }
            info!(output_dir = %output_dir.display(), "conversion finished");
        }
        Commands::Inspect { input } => {
            let source = read_payload(&input)?;
            let outcomes = converter.convert_all(&source.payload);
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            print_summary(&source.source_id, &BatchSummary::from_outcomes(&outcomes));
        }
    }

    Ok(())
}

fn print_summary(source_id: &str, summary: &BatchSummary) {
    eprintln!(
        "{}: {} records, {} converted, {} failed, mean confidence {:.1}, issues {} error / {} warning / {} info",
        source_id,
        summary.total,
        summary.converted,
        summary.failed,
        summary.mean_confidence,
        summary.issues.errors,
        summary.issues.warnings,
        summary.issues.infos
    );
}
