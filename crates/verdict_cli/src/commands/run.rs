//! Scenario execution commands.

use super::{with_suggestion, Options};
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use verdict_core::{
    value_to_text, HttpTransport, RunConfig, Scenario, ScenarioReport, ScenarioRunner,
};

/// Run a single scenario. Returns whether it passed.
pub fn one(options: &Options, name_or_path: &str) -> Result<bool> {
    let catalog = options.catalog()?;
    let scenario = catalog.resolve(name_or_path).map_err(with_suggestion)?;
    let config = options.run_config()?;

    println!(
        "{} Running {} against {}",
        style("→").cyan(),
        style(&scenario.name).bold(),
        style(config.base_url()).cyan()
    );

    let report = execute(&scenario, &config)?;
    print_report(&report);
    Ok(report.passed())
}

/// Run every catalog scenario in name order. Returns whether all passed.
pub fn all(options: &Options) -> Result<bool> {
    let catalog = options.catalog()?;
    let config = options.run_config()?;

    println!(
        "{} Running {} scenarios against {}",
        style("→").cyan(),
        catalog.len(),
        style(config.base_url()).cyan()
    );

    let mut failed = Vec::new();
    for scenario in catalog.iter() {
        println!();
        println!("{}", style(&scenario.name).bold());
        let report = execute(scenario, &config)?;
        print_report(&report);
        if !report.passed() {
            failed.push(report.name);
        }
    }

    println!();
    if failed.is_empty() {
        println!(
            "{} {}",
            style("✓").green(),
            style(format!("All {} scenarios passed", catalog.len())).green()
        );
    } else {
        println!(
            "{} {}",
            style("×").red(),
            style(format!(
                "{} of {} scenarios failed: {}",
                failed.len(),
                catalog.len(),
                failed.join(", ")
            ))
            .red()
            .bold()
        );
    }
    Ok(failed.is_empty())
}

fn execute(scenario: &Scenario, config: &RunConfig) -> Result<ScenarioReport> {
    let transport = HttpTransport::new(config)
        .map_err(with_suggestion)
        .context("Failed to set up HTTP client")?;
    let runner = ScenarioRunner::new(transport, config.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let pb = spinner.clone();
    let report = runner.run_with_progress(scenario, &move |current, total, label| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
        pb.set_message(label.to_string());
    });

    spinner.finish_and_clear();
    Ok(report)
}

fn print_report(report: &ScenarioReport) {
    for record in &report.steps {
        let status = match record.status {
            Some(code) => style(code.to_string()).cyan(),
            None => style("---".to_string()).red(),
        };
        let failed_here = report
            .failure
            .as_ref()
            .is_some_and(|f| f.index == record.index);
        let mark = if failed_here {
            style("×").red()
        } else {
            style("✓").green()
        };
        println!(
            "  {} [{}] {} {} {}",
            mark, record.index, status, record.method, record.url
        );
    }

    if let Some(failed) = &report.failure {
        if !report.steps.iter().any(|r| r.index == failed.index) {
            println!(
                "  {} [{}] {} (not sent)",
                style("×").red(),
                failed.index,
                failed.label
            );
        }
        println!();
        println!("  {}", style("Failure:").red().bold());
        println!("    step {}: {}", failed.index, failed.label);
        println!("    {}", failed.failure);
    }

    if !report.captures.is_empty() {
        println!();
        println!("  {}", style("Captured:").bold());
        for (name, value) in &report.captures {
            println!("    {} = {}", name, style(value_to_text(value)).cyan());
        }
    }

    if report.cleanup.attempted() > 0 {
        println!();
        println!("  {}", style("Cleanup:").bold());
        for record in &report.cleanup.records {
            match &record.result {
                Ok(status) => println!(
                    "    {} {} {} {}",
                    style("✓").green(),
                    style(status).cyan(),
                    record.method,
                    record.url
                ),
                Err(err) => println!(
                    "    {} {} {} ({})",
                    style("⚠").yellow(),
                    record.method,
                    record.url,
                    style(err).yellow()
                ),
            }
        }
    }

    println!();
    let summary = format!("{} in {:.2?}", report.summary(), report.elapsed);
    if report.passed() {
        println!("{} {}", style("✓").green(), style(summary).green());
    } else {
        println!("{} {}", style("×").red(), style(summary).red().bold());
    }
}
