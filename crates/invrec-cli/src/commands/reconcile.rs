//! Reconcile command - match approved invoices against a project estimate.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::warn;

use invrec_core::matcher::match_invoices;
use invrec_core::models::matching::{MatchResult, ProjectEstimate, VarianceBand};
use invrec_core::models::invoice::{ParsedInvoice, ReviewStatus};

use super::process::load_config;

/// Arguments for the reconcile command.
#[derive(Args)]
pub struct ReconcileArgs {
    /// JSON file with extracted invoices (array of invoices)
    #[arg(short, long)]
    invoices: PathBuf,

    /// JSON file with the project estimate
    #[arg(short, long)]
    estimate: PathBuf,

    /// Write the full match result as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include invoices that have not been approved yet
    #[arg(long)]
    include_unapproved: bool,
}

pub async fn run(args: ReconcileArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let invoices: Vec<ParsedInvoice> = serde_json::from_str(&fs::read_to_string(&args.invoices)?)?;
    let estimate: ProjectEstimate = serde_json::from_str(&fs::read_to_string(&args.estimate)?)?;

    let selected: Vec<ParsedInvoice> = if args.include_unapproved {
        invoices
    } else {
        let (approved, skipped): (Vec<_>, Vec<_>) = invoices
            .into_iter()
            .partition(|i| i.status == ReviewStatus::Approved);
        if !skipped.is_empty() {
            warn!(
                count = skipped.len(),
                "Skipping unapproved invoices (use --include-unapproved to keep them)"
            );
        }
        approved
    };

    let result = match_invoices(&selected, &estimate, &config.matching);

    print_variance_table(&result);

    if let Some(output_path) = &args.output {
        fs::write(output_path, serde_json::to_string_pretty(&result)?)?;
        println!(
            "{} Match result written to {}",
            style("✓").green(),
            output_path.display()
        );
    }

    Ok(())
}

fn print_variance_table(result: &MatchResult) {
    println!("Project: {}", style(&result.project_id).bold());
    println!();
    println!(
        "{:<30} {:>12} {:>12} {:>12}  {}",
        "Category", "Estimated", "Actual", "Variance", "Band"
    );

    for variance in &result.variances {
        let band = match variance.band {
            VarianceBand::Under => style("under").cyan(),
            VarianceBand::OnTarget => style("on target").green(),
            VarianceBand::Over => style("over").red(),
        };
        println!(
            "{:<30} {:>12} {:>12} {:>12}  {}",
            variance.category, variance.estimated, variance.actual, variance.variance, band
        );
    }

    println!();
    println!(
        "{:<30} {:>12} {:>12} {:>12}",
        "Total", result.totals.estimated, result.totals.actual, result.totals.variance
    );

    let unmatched: Vec<_> = result.unmatched().collect();
    if !unmatched.is_empty() {
        println!();
        println!(
            "{} {} item(s) unmatched, {} total:",
            style("!").yellow(),
            unmatched.len(),
            result.totals.unmatched_amount
        );
        for item in unmatched {
            println!("  {} ({})", item.description, item.amount);
        }
    }
}
