pub mod baseline;
pub mod list;
pub mod run;

use std::path::{Path, PathBuf};

use quantix_e2e::visual::VisualConfig;

/// Derive the visual directories from the report output directory, so
/// `verification/` holds `actual/`, `baseline/`, `diff/` and `report.json`
/// side by side.
pub fn visual_config(output: &Path, threshold: f64, auto_update: bool) -> VisualConfig {
    VisualConfig {
        baseline_dir: output.join("baseline"),
        actual_dir: output.join("actual"),
        diff_dir: output.join("diff"),
        threshold,
        auto_update,
        ..VisualConfig::default()
    }
}

pub fn screenshot_dir(output: &Path) -> PathBuf {
    output.join("actual")
}
