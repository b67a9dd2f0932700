//! Suite orchestration: server, browser sessions, host-side assertions,
//! visual comparison, and the JSON report.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::browser::{BrowserConfig, BrowserSession, ScriptEvent};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::{Scenario, Step};
use crate::server::{AppServer, ServerMode};
use crate::visual::{VisualConfig, VisualDiff, VisualTester};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerMode,
    pub startup_timeout: Duration,
    pub browser: BrowserConfig,
    pub visual: VisualConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerMode::External {
                origin: "http://127.0.0.1:8080".to_string(),
            },
            startup_timeout: Duration::from_secs(30),
            browser: BrowserConfig::default(),
            visual: VisualConfig::default(),
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("verification"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub ok: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualReport {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    #[serde(default)]
    pub console: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub visual: Vec<VisualReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

/// Runs verification scenarios against one app server.
pub struct Runner {
    config: RunnerConfig,
    server: Option<AppServer>,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            server: None,
        }
    }

    /// Start or attach the app server and point the browser at it.
    pub async fn start_server(&mut self) -> HarnessResult<()> {
        if self.server.is_some() {
            return Ok(());
        }
        let server = AppServer::start(&self.config.server, self.config.startup_timeout).await?;
        self.config.browser.base_url = server.base_url().to_string();
        self.server = Some(server);
        Ok(())
    }

    pub fn stop_server(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop();
        }
    }

    pub fn load_scenarios(&self) -> HarnessResult<Vec<Scenario>> {
        Scenario::load_dir(&self.config.scenarios_dir)
    }

    pub async fn run_all(&mut self) -> HarnessResult<SuiteReport> {
        let scenarios = self.load_scenarios()?;
        self.run_scenarios(&scenarios).await
    }

    pub async fn run_tagged(&mut self, tag: &str) -> HarnessResult<SuiteReport> {
        let scenarios: Vec<Scenario> = self
            .load_scenarios()?
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect();
        self.run_scenarios(&scenarios).await
    }

    pub async fn run_named(&mut self, name: &str) -> HarnessResult<SuiteReport> {
        let scenario = self
            .load_scenarios()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| HarnessError::ScenarioNotFound(name.to_string()))?;
        self.run_scenarios(std::slice::from_ref(&scenario)).await
    }

    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> HarnessResult<SuiteReport> {
        let start = Instant::now();
        self.start_server().await?;

        info!("running {} scenario(s)...", scenarios.len());

        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        for scenario in scenarios {
            match self.run_scenario(scenario).await {
                Ok(report) => {
                    if report.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", report.name, report.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            report.name,
                            report.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(report);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", scenario.name, e);
                    results.push(ScenarioReport {
                        name: scenario.name.clone(),
                        success: false,
                        duration_ms: 0,
                        steps: vec![],
                        console: vec![],
                        screenshots: vec![],
                        visual: vec![],
                        error: Some(e.to_string()),
                        error_screenshot: None,
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "suite finished: {passed} passed, {failed} failed ({duration_ms} ms)"
        );

        Ok(SuiteReport {
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run one scenario in its own browser session.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> HarnessResult<ScenarioReport> {
        let start = Instant::now();
        self.start_server().await?;

        let session = BrowserSession::new(self.config.browser.clone())?;
        let events = session.run(scenario).await?;

        let mut report = collate_events(scenario, &events);
        report.duration_ms = start.elapsed().as_millis() as u64;

        // Visual regression only once the behavioral steps are green.
        if scenario.visual_regression && report.success {
            let tester = VisualTester::new(self.config.visual.clone())?;
            for shot in report.screenshots.clone() {
                match tester.compare(&shot, Some(scenario.visual_threshold)) {
                    Ok(diff) => {
                        if !diff.matches && report.error.is_none() {
                            report.success = false;
                            report.error = Some(
                                visual_mismatch(&shot, &diff, scenario.visual_threshold)
                                    .to_string(),
                            );
                        }
                        report.visual.push(VisualReport {
                            name: shot,
                            matches: diff.matches,
                            diff_percent: diff.diff_percent,
                            diff_image: diff
                                .diff_image
                                .map(|p| p.to_string_lossy().to_string()),
                        });
                    }
                    Err(HarnessError::BaselineNotFound(_)) => {
                        info!(
                            "no baseline for '{shot}' yet; run with --update-baselines to adopt it"
                        );
                    }
                    Err(e) => {
                        report.success = false;
                        report.error = Some(format!("visual comparison failed: {e}"));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Promote every captured screenshot to baseline.
    pub fn update_baselines(&self) -> HarnessResult<Vec<String>> {
        VisualTester::new(self.config.visual.clone())?.update_all()
    }

    pub fn write_report(&self, report: &SuiteReport) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join("report.json");
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!("report written to {}", path.display());
        Ok(path)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop_server();
    }
}

fn visual_mismatch(shot: &str, diff: &VisualDiff, threshold: f64) -> HarnessError {
    HarnessError::ScreenshotMismatch {
        name: shot.to_string(),
        diff_percent: diff.diff_percent,
        threshold,
    }
}

/// Fold the session event stream into a scenario report, applying the
/// host-side checks (page-content assertions, expected evaluate results).
pub fn collate_events(scenario: &Scenario, events: &[ScriptEvent]) -> ScenarioReport {
    let mut report = ScenarioReport {
        name: scenario.name.clone(),
        success: true,
        duration_ms: 0,
        steps: vec![],
        console: vec![],
        screenshots: vec![],
        visual: vec![],
        error: None,
        error_screenshot: None,
    };

    for event in events {
        match event {
            ScriptEvent::Console { console } => report.console.push(console.clone()),
            ScriptEvent::Fatal { fatal, screenshot } => {
                report.success = false;
                if report.error.is_none() {
                    report.error = Some(fatal.clone());
                }
                report.error_screenshot = screenshot.clone();
            }
            ScriptEvent::Done { .. } => {}
            ScriptEvent::Step(step_event) => {
                let mut step_report = StepReport {
                    name: step_event.name.clone(),
                    ok: step_event.ok,
                    duration_ms: step_event.ms,
                    error: step_event.error.clone(),
                };

                if step_event.ok {
                    if let Some(step) = scenario.steps.get(step_event.step) {
                        if let Err(reason) = host_check(step, step_event.content.as_deref(), step_event.value.as_ref()) {
                            step_report.ok = false;
                            step_report.error = Some(reason);
                        }
                    }
                }

                if let Some(shot) = &step_event.shot {
                    report.screenshots.push(shot.clone());
                }
                if !step_report.ok {
                    report.success = false;
                    if report.error.is_none() {
                        report.error = Some(format!(
                            "{}: {}",
                            step_report.name,
                            step_report.error.as_deref().unwrap_or("step failed")
                        ));
                    }
                }
                report.steps.push(step_report);
            }
        }
    }

    report
}

/// Checks that run in Rust on data the session shipped back.
fn host_check(
    step: &Step,
    content: Option<&str>,
    value: Option<&serde_json::Value>,
) -> Result<(), String> {
    match step {
        Step::AssertContent {
            contains,
            not_contains,
            not_matches,
        } => {
            let content =
                content.ok_or_else(|| "session returned no page content".to_string())?;
            for needle in contains {
                if !content.contains(needle) {
                    return Err(format!("page content missing {needle:?}"));
                }
            }
            for needle in not_contains {
                if content.contains(needle) {
                    return Err(format!("page content contains forbidden {needle:?}"));
                }
            }
            for pattern in not_matches {
                // Validated at scenario load; compile again for the match.
                let re = Regex::new(pattern).map_err(|e| e.to_string())?;
                if let Some(found) = re.find(content) {
                    return Err(format!(
                        "page content matches forbidden pattern {pattern:?}: {:?}",
                        found.as_str()
                    ));
                }
            }
            Ok(())
        }
        Step::Evaluate {
            expected: Some(expected),
            ..
        } => match value {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(format!("evaluate returned {actual}, expected {expected}")),
            None => Err(format!("evaluate returned nothing, expected {expected}")),
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::StepEvent;

    fn scenario() -> Scenario {
        Scenario::from_yaml(
            r#"
name: macro-rounding
steps:
  - action: navigate
    path: /
  - action: assert_content
    contains: ["P:21 C:30 G:11"]
    not_matches: ['P:\d+\.']
  - action: screenshot
    name: macro_fix
"#,
        )
        .unwrap()
    }

    fn step_event(step: usize, name: &str) -> StepEvent {
        StepEvent {
            step,
            name: name.to_string(),
            ok: true,
            ms: 10,
            error: None,
            content: None,
            value: None,
            shot: None,
        }
    }

    #[test]
    fn passing_stream_collates_to_success() {
        let content = "<div>Feed P:21 C:30 G:11</div>";
        let events = vec![
            ScriptEvent::Console {
                console: "App booted".to_string(),
            },
            ScriptEvent::Step(step_event(0, "navigate:/")),
            ScriptEvent::Step(StepEvent {
                content: Some(content.to_string()),
                ..step_event(1, "assert_content")
            }),
            ScriptEvent::Step(StepEvent {
                shot: Some("macro_fix".to_string()),
                ..step_event(2, "screenshot:macro_fix")
            }),
            ScriptEvent::Done { done: true },
        ];

        let report = collate_events(&scenario(), &events);
        assert!(report.success);
        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.screenshots, vec!["macro_fix"]);
        assert_eq!(report.console, vec!["App booted"]);
    }

    #[test]
    fn decimal_macros_fail_the_content_check() {
        let content = "<div>Feed P:20.9 C:30 G:11 and P:21 C:30 G:11</div>";
        let events = vec![
            ScriptEvent::Step(step_event(0, "navigate:/")),
            ScriptEvent::Step(StepEvent {
                content: Some(content.to_string()),
                ..step_event(1, "assert_content")
            }),
        ];

        let report = collate_events(&scenario(), &events);
        assert!(!report.success);
        let error = report.error.unwrap();
        assert!(error.contains("forbidden pattern"));
        assert!(error.contains("P:20."));
    }

    #[test]
    fn missing_substring_fails_the_content_check() {
        let events = vec![ScriptEvent::Step(StepEvent {
            content: Some("<div>P:21 C:30 G:10</div>".to_string()),
            ..step_event(1, "assert_content")
        })];
        let report = collate_events(&scenario(), &events);
        assert!(!report.success);
        assert!(report.error.unwrap().contains("missing"));
    }

    #[test]
    fn fatal_event_carries_error_screenshot() {
        let events = vec![
            ScriptEvent::Step(StepEvent {
                ok: false,
                error: Some("timeout waiting for #hero-cals-left".to_string()),
                ..step_event(0, "wait:#hero-cals-left")
            }),
            ScriptEvent::Fatal {
                fatal: "timeout waiting for #hero-cals-left".to_string(),
                screenshot: Some("macro-rounding-error".to_string()),
            },
        ];
        let report = collate_events(&scenario(), &events);
        assert!(!report.success);
        assert_eq!(
            report.error_screenshot.as_deref(),
            Some("macro-rounding-error")
        );
        assert!(report.error.unwrap().contains("timeout"));
    }

    #[test]
    fn visual_mismatch_names_shot_and_threshold() {
        let diff = VisualDiff {
            matches: false,
            diff_percent: 3.42,
            diff_pixels: 1234,
            total_pixels: 36_000,
            diff_image: None,
        };
        let err = visual_mismatch("i18n_home", &diff, 1.0);
        assert!(matches!(err, HarnessError::ScreenshotMismatch { .. }));
        let msg = err.to_string();
        assert!(msg.contains("i18n_home"));
        assert!(msg.contains("3.42"));
        assert!(msg.contains("1.00"));
    }

    #[test]
    fn evaluate_expectation_checked_host_side() {
        let scenario = Scenario::from_yaml(
            r#"
name: eval
steps:
  - action: evaluate
    script: "() => 2 + 2"
    expected: 4
"#,
        )
        .unwrap();

        let ok = vec![ScriptEvent::Step(StepEvent {
            value: Some(serde_json::json!(4)),
            ..step_event(0, "evaluate")
        })];
        assert!(collate_events(&scenario, &ok).success);

        let bad = vec![ScriptEvent::Step(StepEvent {
            value: Some(serde_json::json!(5)),
            ..step_event(0, "evaluate")
        })];
        let report = collate_events(&scenario, &bad);
        assert!(!report.success);
        assert!(report.error.unwrap().contains("expected 4"));
    }
}
