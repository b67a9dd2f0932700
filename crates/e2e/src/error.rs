//! Error types for the verification harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("App server failed to start: {0}")]
    ServerStartup(String),

    #[error("App origin {origin} not reachable after {attempts} attempts")]
    OriginUnreachable { origin: String, attempts: usize },

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser session failed: {0}")]
    Session(String),

    #[error("Unknown browser engine '{0}' (expected chromium, firefox or webkit)")]
    UnknownEngine(String),

    #[error("Scenario load error: {0}")]
    ScenarioLoad(String),

    #[error("Duplicate scenario name: {0}")]
    DuplicateScenario(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Invalid content pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Screenshot '{name}' differs by {diff_percent:.2}% (threshold {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    #[error("Screenshot '{name}' dimensions changed: {actual} vs baseline {baseline}")]
    ScreenshotDimensions {
        name: String,
        actual: String,
        baseline: String,
    },

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
