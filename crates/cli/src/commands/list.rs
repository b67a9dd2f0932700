//! `quantix-verify list` - show discovered scenarios

use std::path::PathBuf;

use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

use quantix_e2e::scenario::Scenario;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Directory containing scenario YAML files
    #[arg(short, long, default_value = "scenarios")]
    scenarios: PathBuf,
}

pub fn execute(args: ListArgs) -> anyhow::Result<()> {
    let scenarios = Scenario::load_dir(&args.scenarios)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Scenario", "Tags", "Steps", "Visual", "Description"]);

    for scenario in &scenarios {
        table.add_row(vec![
            scenario.name.clone(),
            scenario.tags.join(", "),
            scenario.steps.len().to_string(),
            if scenario.visual_regression {
                format!("≤{:.1}%", scenario.visual_threshold)
            } else {
                "-".to_string()
            },
            scenario.description.clone(),
        ]);
    }

    println!("{table}");
    println!("{} scenario(s)", scenarios.len());
    Ok(())
}
