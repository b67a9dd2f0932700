//! Terminal reporting for suite results

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use quantix_e2e::runner::{ScenarioReport, SuiteReport};

pub fn print_suite(report: &SuiteReport) {
    println!();
    for scenario in &report.results {
        print_scenario(scenario);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Scenario", "Status", "Steps", "Shots", "Duration"]);

    for scenario in &report.results {
        let status = if scenario.success { "pass" } else { "FAIL" };
        table.add_row(vec![
            scenario.name.clone(),
            status.to_string(),
            format!(
                "{}/{}",
                scenario.steps.iter().filter(|s| s.ok).count(),
                scenario.steps.len()
            ),
            scenario.screenshots.len().to_string(),
            format!("{} ms", scenario.duration_ms),
        ]);
    }
    println!("{table}");

    let summary = format!(
        "{} passed, {} failed of {} ({} ms)",
        report.passed, report.failed, report.total, report.duration_ms
    );
    if report.failed == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

fn print_scenario(scenario: &ScenarioReport) {
    if scenario.success {
        println!(
            "{} {} ({} ms)",
            "✓".green(),
            scenario.name,
            scenario.duration_ms
        );
    } else {
        println!(
            "{} {} - {}",
            "✗".red(),
            scenario.name.red(),
            scenario.error.as_deref().unwrap_or("unknown error")
        );
        for step in scenario.steps.iter().filter(|s| !s.ok) {
            println!(
                "    {} {}: {}",
                "step".yellow(),
                step.name,
                step.error.as_deref().unwrap_or("failed")
            );
        }
        if let Some(shot) = &scenario.error_screenshot {
            println!("    error screenshot: {shot}.png");
        }
    }

    for visual in &scenario.visual {
        if !visual.matches {
            println!(
                "    {} {} differs by {:.2}%{}",
                "visual".yellow(),
                visual.name,
                visual.diff_percent,
                visual
                    .diff_image
                    .as_deref()
                    .map(|p| format!(" (diff: {p})"))
                    .unwrap_or_default()
            );
        }
    }
}
