//! Review command - approve or reject extracted invoices.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use uuid::Uuid;

use invrec_core::models::invoice::ParsedInvoice;
use invrec_core::models::training::DocumentMeta;
use invrec_core::training::{approve, reject, JsonlTrainingStore};

use super::training_dir;

/// Arguments for the review command.
#[derive(Args)]
pub struct ReviewArgs {
    #[command(subcommand)]
    command: ReviewCommand,
}

#[derive(Subcommand)]
enum ReviewCommand {
    /// Approve an invoice, optionally applying field corrections
    Approve(ApproveArgs),

    /// Reject an invoice with a reason
    Reject(RejectArgs),
}

#[derive(Args)]
struct ApproveArgs {
    /// JSON file with extracted invoices (array); updated in place
    #[arg(short, long)]
    invoices: PathBuf,

    /// Invoice id to approve
    #[arg(long)]
    id: Uuid,

    /// JSON file mapping field names to corrected values
    #[arg(long)]
    corrections: Option<PathBuf>,

    /// Source document filename, recorded on the training example
    #[arg(long)]
    source: Option<String>,
}

#[derive(Args)]
struct RejectArgs {
    /// JSON file with extracted invoices (array); updated in place
    #[arg(short, long)]
    invoices: PathBuf,

    /// Invoice id to reject
    #[arg(long)]
    id: Uuid,

    /// Why the extraction is unusable
    #[arg(long)]
    reason: String,
}

pub async fn run(args: ReviewArgs) -> anyhow::Result<()> {
    match args.command {
        ReviewCommand::Approve(args) => run_approve(args),
        ReviewCommand::Reject(args) => run_reject(args),
    }
}

fn run_approve(args: ApproveArgs) -> anyhow::Result<()> {
    let mut invoices = load_invoices(&args.invoices)?;
    let invoice = find_invoice(&mut invoices, args.id)?;

    let corrections: Vec<(String, String)> = match &args.corrections {
        Some(path) => {
            let map: BTreeMap<String, String> = serde_json::from_str(&fs::read_to_string(path)?)?;
            map.into_iter().collect()
        }
        None => Vec::new(),
    };

    let metadata = DocumentMeta {
        filename: args.source.clone().unwrap_or_default(),
        page_count: invoice.page_group.pages.len(),
        size_bytes: 0,
    };

    let store = JsonlTrainingStore::new(training_dir());
    let example = approve(&store, invoice, &corrections, metadata)?;

    println!(
        "{} Approved {} with {} correction(s)",
        style("✓").green(),
        args.id,
        example.corrections.len()
    );

    save_invoices(&args.invoices, &invoices)
}

fn run_reject(args: RejectArgs) -> anyhow::Result<()> {
    let mut invoices = load_invoices(&args.invoices)?;
    let invoice = find_invoice(&mut invoices, args.id)?;

    let store = JsonlTrainingStore::new(training_dir());
    reject(&store, invoice, &args.reason)?;

    println!("{} Rejected {}: {}", style("✗").red(), args.id, args.reason);

    save_invoices(&args.invoices, &invoices)
}

fn load_invoices(path: &PathBuf) -> anyhow::Result<Vec<ParsedInvoice>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn save_invoices(path: &PathBuf, invoices: &[ParsedInvoice]) -> anyhow::Result<()> {
    fs::write(path, serde_json::to_string_pretty(invoices)?)?;
    Ok(())
}

fn find_invoice(invoices: &mut [ParsedInvoice], id: Uuid) -> anyhow::Result<&mut ParsedInvoice> {
    invoices
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| anyhow::anyhow!("Invoice not found: {}", id))
}
