//! `quantix-verify baseline` - manage visual regression baselines

use std::path::PathBuf;

use clap::{Args, Subcommand};
use colored::Colorize;

use quantix_e2e::visual::VisualTester;

#[derive(Subcommand, Debug)]
pub enum BaselineCommands {
    /// List stored baselines
    List(BaselineArgs),

    /// Promote captured screenshots to baselines
    Update(BaselineArgs),
}

#[derive(Args, Debug)]
pub struct BaselineArgs {
    /// Output directory holding actual/ and baseline/
    #[arg(short, long, default_value = "verification")]
    output: PathBuf,
}

pub fn execute(cmd: BaselineCommands) -> anyhow::Result<()> {
    match cmd {
        BaselineCommands::List(args) => {
            let tester = VisualTester::new(crate::commands::visual_config(&args.output, 0.5, false))?;
            let baselines = tester.list_baselines()?;
            if baselines.is_empty() {
                println!("no baselines stored under {}", args.output.display());
            } else {
                for name in baselines {
                    println!("{name}");
                }
            }
        }
        BaselineCommands::Update(args) => {
            let tester = VisualTester::new(crate::commands::visual_config(&args.output, 0.5, false))?;
            let updated = tester.update_all()?;
            for name in &updated {
                println!("{} {}", "updated".green(), name);
            }
            println!("{} baseline(s) updated", updated.len());
        }
    }
    Ok(())
}
