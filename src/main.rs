use std::path::PathBuf;

use clap::{Parser, Subcommand};
use equipment_reports::config::{DEFAULT_BASE_DIR, ReportConfig};
use equipment_reports::pipeline::{self, DEFAULT_PDF_DIR, ProcessOptions};
use equipment_reports::{ReportError, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ReportError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Template { base } => {
            let config = ReportConfig::new(base);
            let path = pipeline::create_template(&config)?;
            print_json(&path)
        }
        Command::Validate(args) => {
            let config = args.config()?;
            print_json(&pipeline::validate(&config, &args.input)?)
        }
        Command::Process(args) => {
            let config = args.input.config()?;
            let options = ProcessOptions {
                pdf_dir: args.pdf.then_some(args.pdf_dir),
            };
            print_json(&pipeline::process(&config, &args.input.input, &options)?)
        }
        Command::ReportXlsx(args) => {
            let config = args.config()?;
            print_json(&pipeline::store_reports(&config, &args.input)?)
        }
        Command::ReportPdf(args) => {
            let config = args.input.config()?;
            print_json(&pipeline::pdf_reports(
                &config,
                &args.input.input,
                &args.pdf_dir,
            )?)
        }
        Command::Summary(args) => {
            let config = args.config()?;
            print_json(&pipeline::summary(&config, &args.input)?)
        }
        Command::Suggest(args) => {
            let config = args.config()?;
            print_json(&pipeline::suggest(&config, &args.input)?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Price equipment sheets per store and produce XLSX and PDF reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the folder layout and an empty input template.
    Template {
        /// Base directory of the report project.
        #[arg(long, default_value = DEFAULT_BASE_DIR)]
        base: PathBuf,
    },
    /// Validate the input sheet and log rejected rows.
    Validate(InputArgs),
    /// Run the full pipeline: reports, summary and history update.
    Process(ProcessArgs),
    /// Generate only the per-store workbooks.
    ReportXlsx(InputArgs),
    /// Generate only the per-store PDF reports.
    ReportPdf(PdfArgs),
    /// Generate only the consolidated summary.
    Summary(InputArgs),
    /// Print the suggested price computed for every valid row.
    Suggest(InputArgs),
}

#[derive(clap::Args)]
struct InputArgs {
    /// Input workbook path.
    #[arg(long, short)]
    input: PathBuf,

    /// Base directory; inferred from the input location when omitted.
    #[arg(long)]
    base: Option<PathBuf>,
}

#[derive(clap::Args)]
struct ProcessArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Also write per-store PDF reports.
    #[arg(long)]
    pdf: bool,

    /// Folder under output/ for the PDF reports.
    #[arg(long, default_value = DEFAULT_PDF_DIR)]
    pdf_dir: String,
}

#[derive(clap::Args)]
struct PdfArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Folder under output/ for the PDF reports.
    #[arg(long, default_value = DEFAULT_PDF_DIR)]
    pdf_dir: String,
}

impl InputArgs {
    fn config(&self) -> Result<ReportConfig> {
        if !self.input.exists() {
            return Err(ReportError::MissingInput(self.input.clone()));
        }
        Ok(match &self.base {
            Some(base) => ReportConfig::new(base),
            None => ReportConfig::infer_from_input(&self.input),
        })
    }
}
