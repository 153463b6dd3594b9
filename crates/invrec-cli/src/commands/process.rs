//! Process command - extract invoices from a PDF document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invrec_core::models::config::InvrecConfig;
use invrec_core::pipeline::{ExtractionPipeline, ExtractionReport, Stage};
use invrec_core::training::{JsonlTrainingStore, TrainingStore};
use invrec_core::{
    build_provider, extract_page_texts, Orchestrator, UploadChannel, UploadedDocument,
};

use super::training_dir;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per invoice
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if config.extraction.providers.is_empty() {
        anyhow::bail!(
            "No extraction providers configured. Add at least one under \
             \"extraction.providers\" (run 'invrec config init')."
        );
    }

    info!("Processing file: {}", args.input.display());

    let data = fs::read(&args.input)?;
    let document = UploadedDocument::new(
        args.input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        data.len() as u64,
        UploadChannel::Dashboard,
    );

    let pages = extract_page_texts(&data)?;
    debug!("PDF has {} pages", pages.len());

    // Historical corrections feed the confidence scorer.
    let store = JsonlTrainingStore::new(training_dir());
    let examples = store.examples().unwrap_or_default();

    let providers = config.extraction.providers.iter().map(build_provider).collect();
    let orchestrator = Orchestrator::new(providers, config.extraction.policy.clone());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    let pb_stage = pb.clone();
    let pipeline = ExtractionPipeline::new(orchestrator, config).with_progress(Box::new(
        move |stage| {
            let msg = match stage {
                Stage::Uploading => "Loading document...",
                Stage::Segmenting => "Segmenting pages...",
                Stage::Extracting => "Extracting invoices...",
                Stage::Scoring => "Scoring fields...",
                Stage::Complete => "Done",
                Stage::Error => "Failed",
            };
            pb_stage.set_message(msg);
        },
    ));

    let report = pipeline.run(&document, &pages, &examples).await?;
    pb.finish_with_message("Done");

    for warning in &report.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
    for failure in &report.failures {
        eprintln!(
            "{} Pages {:?} need manual entry: {}",
            style("✗").red(),
            failure.pages,
            failure.reason
        );
    }

    let output = format_report(&report, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        for invoice in &report.invoices {
            let flag = if invoice.needs_review {
                style("needs review").yellow().to_string()
            } else {
                style("ok").green().to_string()
            };
            println!(
                "{} {} ({}) confidence {:.1}% [{}]",
                style("ℹ").blue(),
                invoice.invoice_number,
                invoice.vendor_name,
                invoice.confidence * 100.0,
                flag
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvrecConfig> {
    match config_path {
        Some(path) => Ok(InvrecConfig::from_file(Path::new(path))?),
        None => Ok(InvrecConfig::default()),
    }
}

fn format_report(report: &ExtractionReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &ExtractionReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "invoice_number",
        "vendor_name",
        "invoice_date",
        "subtotal",
        "tax_amount",
        "total_amount",
        "confidence",
        "needs_review",
        "pages",
    ])?;

    for invoice in &report.invoices {
        let pages = invoice
            .page_group
            .pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        wtr.write_record([
            invoice.invoice_number.clone(),
            invoice.vendor_name.clone(),
            invoice
                .invoice_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            invoice.subtotal.map(|d| d.to_string()).unwrap_or_default(),
            invoice
                .tax_amount
                .map(|d| d.to_string())
                .unwrap_or_default(),
            invoice.total_amount.to_string(),
            format!("{:.3}", invoice.confidence),
            invoice.needs_review.to_string(),
            pages,
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(report: &ExtractionReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n\n", report.summary));

    for invoice in &report.invoices {
        output.push_str(&format!("Invoice: {}\n", invoice.invoice_number));
        output.push_str(&format!("  Vendor: {}\n", invoice.vendor_name));
        if let Some(date) = invoice.invoice_date {
            output.push_str(&format!("  Date:   {}\n", date));
        }
        output.push_str(&format!("  Total:  {}\n", invoice.total_amount));
        output.push_str(&format!("  Pages:  {:?}\n", invoice.page_group.pages));
        for item in &invoice.line_items {
            output.push_str(&format!(
                "    {} x {} = {}  {}\n",
                item.quantity, item.unit_price, item.total, item.description
            ));
        }
        output.push('\n');
    }

    output.push_str(&format!("Total extracted: {}\n", report.total_amount));
    output
}
