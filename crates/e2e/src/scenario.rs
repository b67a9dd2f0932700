//! Declarative YAML verification scenarios

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{MealFixture, StorageSeed};

/// A complete verification scenario parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name, also used for report and error-screenshot filenames.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering (`smoke`, `analytics`, ...).
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Browser context locale, e.g. "en-US". Defaults to the engine's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    pub steps: Vec<Step>,

    /// Compare captured screenshots against stored baselines.
    #[serde(default)]
    pub visual_regression: bool,

    /// Allowed pixel difference (0.0 - 100.0 percent).
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,
}

fn default_viewport() -> Viewport {
    Viewport {
        width: 1280,
        height: 720,
    }
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single scenario step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a path relative to the app origin.
    Navigate {
        #[serde(default = "default_path")]
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_for: Option<String>,
    },

    /// Inject fixture documents into the app's persisted storage.
    ///
    /// With `before_load` the seed is registered as a context init script
    /// and lands before the app first boots; otherwise it is written into
    /// the live page and usually followed by a `reload`.
    SeedStorage {
        #[serde(flatten)]
        seed: StorageSeed,
        #[serde(default)]
        before_load: bool,
    },

    /// Reload the page so freshly seeded storage is picked up.
    Reload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_for: Option<String>,
    },

    /// Dismiss the blocking API-key modal if it is showing.
    EnterApiKey { key: String },

    /// Fill and submit the first-run onboarding overlay if it is showing.
    CompleteOnboarding {
        name: String,
        weight: f64,
        height: f64,
        age: u32,
    },

    /// Add a meal through the app's global `App.addMealToDB`.
    AddMeal { meal: MealFixture },

    /// Switch the active tab through `App.switchTab`.
    SwitchTab { tab: String },

    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    Fill {
        selector: String,
        value: String,
    },

    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Fixed delay. The app animates tab switches, so sometimes unavoidable.
    Sleep { ms: u64 },

    ScrollIntoView { selector: String },

    /// Assert on a located element.
    Assert {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text_contains: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_count: Option<usize>,
    },

    /// Assert on the rendered page HTML. `not_matches` patterns are Rust
    /// regexes, validated when the scenario loads and evaluated host-side.
    AssertContent {
        #[serde(default)]
        contains: Vec<String>,
        #[serde(default)]
        not_contains: Vec<String>,
        #[serde(default)]
        not_matches: Vec<String>,
    },

    Screenshot {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
    },

    /// Run arbitrary JS in the page; `script` must be a function expression
    /// like `() => App.switchTab('planner')`. An `expected` JSON value is
    /// compared host-side against the returned result.
    Evaluate {
        script: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<serde_json::Value>,
    },

    Log { message: String },
}

fn default_path() -> String {
    "/".to_string()
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl Step {
    /// Short label used in logs and step results.
    pub fn label(&self) -> String {
        match self {
            Step::Navigate { path, .. } => format!("navigate:{path}"),
            Step::SeedStorage { before_load, .. } => {
                if *before_load {
                    "seed_storage:before_load".to_string()
                } else {
                    "seed_storage".to_string()
                }
            }
            Step::Reload { .. } => "reload".to_string(),
            Step::EnterApiKey { .. } => "enter_api_key".to_string(),
            Step::CompleteOnboarding { .. } => "complete_onboarding".to_string(),
            Step::AddMeal { meal } => format!("add_meal:{}", meal.desc),
            Step::SwitchTab { tab } => format!("switch_tab:{tab}"),
            Step::Click { selector, .. } => format!("click:{selector}"),
            Step::Fill { selector, .. } => format!("fill:{selector}"),
            Step::Wait { selector, .. } => format!("wait:{selector}"),
            Step::Sleep { ms } => format!("sleep:{ms}ms"),
            Step::ScrollIntoView { selector } => format!("scroll:{selector}"),
            Step::Assert { selector, .. } => format!("assert:{selector}"),
            Step::AssertContent { .. } => "assert_content".to_string(),
            Step::Screenshot { name, .. } => format!("screenshot:{name}"),
            Step::Evaluate { .. } => "evaluate".to_string(),
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::ScenarioLoad(format!("{}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Load every `*.yaml` / `*.yml` scenario under `dir`, sorted by path
    /// for a stable run order. Duplicate names are rejected, and a missing
    /// directory is a load failure rather than an empty (vacuously green)
    /// suite.
    pub fn load_dir(dir: &Path) -> HarnessResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(HarnessError::ScenarioLoad(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry =
                entry.map_err(|e| HarnessError::ScenarioLoad(e.to_string()))?;
            let path = entry.into_path();
            if path
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut scenarios = Vec::new();
        for path in paths {
            scenarios.push(Self::from_file(&path)?);
        }

        let mut seen = std::collections::HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.clone()) {
                return Err(HarnessError::DuplicateScenario(scenario.name.clone()));
            }
        }

        Ok(scenarios)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Structural checks that should fail at load time, not mid-run.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::ScenarioLoad(
                "scenario name must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(HarnessError::ScenarioLoad(format!(
                "scenario '{}' has no steps",
                self.name
            )));
        }
        for step in &self.steps {
            if let Step::AssertContent { not_matches, .. } = step {
                for pattern in not_matches {
                    Regex::new(pattern).map_err(|source| HarnessError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Names of the screenshots this scenario captures, in order.
    pub fn screenshot_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Screenshot { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seed_and_assert_steps() {
        let yaml = r#"
name: macro-rounding
description: Macros render as integers in the feed
tags: [smoke, macros]
steps:
  - action: navigate
    path: /
  - action: seed_storage
    profile:
      name: Test User
      weight: 70
      height: 175
      age: 30
      target: 2000
  - action: reload
    wait_for: '#hero-cals-left'
  - action: add_meal
    meal:
      desc: Floaty Meal
      cals: 300
      macros: { p: 20.9, c: 30.1, f: 10.5 }
      category: "Café da Manhã"
      score: 7
  - action: assert_content
    contains: ["P:21 C:30 G:11"]
    not_matches: ['P:\d+\.', 'C:\d+\.']
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "macro-rounding");
        assert_eq!(scenario.steps.len(), 5);
        assert!(scenario.has_tag("macros"));
        assert_eq!(scenario.viewport.width, 1280);

        match &scenario.steps[1] {
            Step::SeedStorage { seed, before_load } => {
                assert!(!before_load);
                assert_eq!(seed.profile.as_ref().unwrap().target, 2000);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn parse_locale_and_viewport() {
        let yaml = r#"
name: i18n-snapshot
locale: en-US
viewport: { width: 375, height: 812 }
steps:
  - action: navigate
    path: /index.html
    wait_for: '#app-container'
  - action: screenshot
    name: en_us
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.locale.as_deref(), Some("en-US"));
        assert_eq!(scenario.viewport.height, 812);
        assert_eq!(scenario.screenshot_names(), vec!["en_us"]);
    }

    #[test]
    fn invalid_content_pattern_fails_at_load() {
        let yaml = r#"
name: bad-pattern
steps:
  - action: assert_content
    not_matches: ['P:(\d+']
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPattern { .. }));
    }

    #[test]
    fn empty_steps_rejected() {
        let yaml = "name: empty\nsteps: []\n";
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn load_dir_rejects_missing_directory() {
        let err = Scenario::load_dir(Path::new("/nonexistent/scenarios")).unwrap_err();
        match err {
            HarnessError::ScenarioLoad(msg) => assert!(msg.contains("not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_dir_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = "name: lang-toggle\nsteps:\n  - action: navigate\n";
        std::fs::write(dir.path().join("a.yaml"), scenario).unwrap();
        std::fs::write(dir.path().join("b.yaml"), scenario).unwrap();

        let err = Scenario::load_dir(dir.path()).unwrap_err();
        match err {
            HarnessError::DuplicateScenario(name) => assert_eq!(name, "lang-toggle"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_dir_keeps_stable_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "name: second\nsteps:\n  - action: navigate\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "name: first\nsteps:\n  - action: navigate\n",
        )
        .unwrap();

        let names: Vec<String> = Scenario::load_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn step_labels() {
        let step = Step::SwitchTab {
            tab: "planner".to_string(),
        };
        assert_eq!(step.label(), "switch_tab:planner");
        let step = Step::Sleep { ms: 500 };
        assert_eq!(step.label(), "sleep:500ms");
    }
}
