//! List available scenarios.

use super::Options;
use anyhow::Result;
use console::style;

pub fn run(options: &Options) -> Result<()> {
    let catalog = options.catalog()?;

    println!("{}", style("Scenarios:").bold());
    for scenario in catalog.iter() {
        println!(
            "  {:<24} {} steps, {} cleanups",
            style(&scenario.name).cyan(),
            scenario.steps.len(),
            scenario.creating_steps()
        );
        if let Some(description) = &scenario.description {
            println!("  {:<24} {}", "", style(description).dim());
        }
    }
    Ok(())
}
