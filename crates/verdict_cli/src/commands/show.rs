//! Print a scenario's steps.

use super::{with_suggestion, Options};
use anyhow::Result;
use console::style;
use verdict_core::{CheckRule, Scenario};

pub fn run(options: &Options, name_or_path: &str) -> Result<()> {
    let catalog = options.catalog()?;
    let scenario = catalog.resolve(name_or_path).map_err(with_suggestion)?;
    print_scenario(&scenario);
    Ok(())
}

fn print_scenario(scenario: &Scenario) {
    println!("{}", style(&scenario.name).bold());
    if let Some(description) = &scenario.description {
        println!("{}", style(description).dim());
    }

    for (i, step) in scenario.steps.iter().enumerate() {
        println!();
        println!(
            "  {} {} {}",
            style(format!("[{}]", i)).cyan(),
            style(step.method).bold(),
            step.path
        );
        if let Some(name) = &step.name {
            println!("      name:    {}", name);
        }
        println!("      expect:  {:?}", step.expect_status);
        if let Some(body) = &step.body {
            println!("      body:    {}", body);
        }
        for (header, value) in &step.headers {
            println!("      header:  {}: {}", header, value);
        }
        for (name, field) in &step.captures {
            println!("      capture: {} <- {}", name, field);
        }
        for check in &step.checks {
            let rule = match &check.rule {
                CheckRule::Present => "present".to_string(),
                CheckRule::Equals(value) => format!("== {}", value),
                CheckRule::OneOf(values) => format!(
                    "in [{}]",
                    values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            let optional = if check.optional { " (optional)" } else { "" };
            println!("      check:   {} {}{}", check.field, rule, optional);
        }
        if let Some(cleanup) = &step.cleanup {
            println!(
                "      cleanup: {} {} expect {:?}",
                cleanup.method, cleanup.path, cleanup.expect_status
            );
        }
    }

    let unresolved = scenario.unresolved_references();
    if !unresolved.is_empty() {
        println!();
        println!("{}", style("Warnings:").yellow().bold());
        for (step, name) in unresolved {
            println!(
                "  {} step {} references '{}' before any step captures it",
                style("⚠").yellow(),
                step,
                name
            );
        }
    }
}
