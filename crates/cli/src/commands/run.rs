//! `quantix-verify run` - execute scenarios against the app

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use quantix_e2e::browser::{BrowserConfig, Engine};
use quantix_e2e::runner::{Runner, RunnerConfig};
use quantix_e2e::server::ServerMode;

use crate::output;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory containing scenario YAML files
    #[arg(short, long, default_value = "scenarios")]
    scenarios: PathBuf,

    /// Run only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Attach to an app already served at this origin
    #[arg(long, conflicts_with = "app_dir")]
    origin: Option<String>,

    /// Serve this app bundle directory with the built-in server
    #[arg(long, default_value = "dist")]
    app_dir: PathBuf,

    /// Port for the built-in server (0 = OS-assigned)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Seconds to wait for the app server
    #[arg(long, default_value = "30")]
    startup_timeout: u64,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Working directory for node, where playwright is installed
    #[arg(long, default_value = ".")]
    node_cwd: PathBuf,

    /// Visual diff threshold in percent
    #[arg(long, default_value = "0.5")]
    visual_threshold: f64,

    /// Promote captured screenshots to baselines after the run
    #[arg(long)]
    update_baselines: bool,

    /// Output directory for screenshots, diffs and the JSON report
    #[arg(short, long, default_value = "verification")]
    output: PathBuf,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<bool> {
    let server = match &args.origin {
        Some(origin) => ServerMode::External {
            origin: origin.clone(),
        },
        None => ServerMode::Builtin {
            app_dir: args.app_dir.clone(),
            port: (args.port != 0).then_some(args.port),
        },
    };

    let config = RunnerConfig {
        server,
        startup_timeout: Duration::from_secs(args.startup_timeout),
        browser: BrowserConfig {
            screenshot_dir: crate::commands::screenshot_dir(&args.output),
            engine: args.browser.parse::<Engine>()?,
            headless: !args.headed,
            node_cwd: args.node_cwd.clone(),
            ..BrowserConfig::default()
        },
        visual: crate::commands::visual_config(
            &args.output,
            args.visual_threshold,
            args.update_baselines,
        ),
        scenarios_dir: args.scenarios.clone(),
        output_dir: args.output.clone(),
    };

    let mut runner = Runner::new(config);

    let report = if let Some(name) = &args.name {
        runner.run_named(name).await?
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await?
    } else {
        runner.run_all().await?
    };

    if args.update_baselines {
        let updated = runner.update_baselines()?;
        for name in &updated {
            println!("baseline updated: {name}");
        }
    }

    runner.write_report(&report)?;
    output::print_suite(&report);

    Ok(report.failed == 0)
}
