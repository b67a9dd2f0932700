//! Screenshot regression against stored baselines

use std::path::{Path, PathBuf};

use image::RgbaImage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Channel delta below which two pixels count as equal. Absorbs
/// anti-aliasing and PNG encoder drift.
const DEFAULT_CHANNEL_TOLERANCE: u8 = 5;

#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Allowed differing-pixel percentage.
    pub threshold: f64,
    pub channel_tolerance: u8,
    /// Adopt the actual screenshot when no baseline exists yet.
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("verification/baseline"),
            actual_dir: PathBuf::from("verification/actual"),
            diff_dir: PathBuf::from("verification/diff"),
            threshold: 0.5,
            channel_tolerance: DEFAULT_CHANNEL_TOLERANCE,
            auto_update: false,
        }
    }
}

/// Outcome of comparing one screenshot with its baseline.
#[derive(Debug, Clone)]
pub struct VisualDiff {
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image: Option<PathBuf>,
}

impl VisualDiff {
    fn identical(total_pixels: u64) -> Self {
        Self {
            matches: true,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels,
            diff_image: None,
        }
    }
}

pub struct VisualTester {
    config: VisualConfig,
}

impl VisualTester {
    pub fn new(config: VisualConfig) -> HarnessResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    /// Compare a captured screenshot against its baseline.
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> HarnessResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.config.threshold);
        let actual_path = self.actual_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(HarnessError::AssertionFailed(format!(
                "screenshot '{name}' was never captured: {}",
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            if self.config.auto_update {
                info!("adopting '{name}' as new baseline");
                std::fs::copy(&actual_path, &baseline_path)?;
                return Ok(VisualDiff::identical(0));
            }
            return Err(HarnessError::BaselineNotFound(
                baseline_path.to_string_lossy().to_string(),
            ));
        }

        // Byte-identical files need no pixel walk.
        if file_sha256(&actual_path)? == file_sha256(&baseline_path)? {
            debug!("'{name}' matches baseline exactly");
            let img = image::open(&actual_path)?;
            return Ok(VisualDiff::identical(
                u64::from(img.width()) * u64::from(img.height()),
            ));
        }

        let actual = image::open(&actual_path)?.to_rgba8();
        let baseline = image::open(&baseline_path)?.to_rgba8();

        if actual.dimensions() != baseline.dimensions() {
            return Err(HarnessError::ScreenshotDimensions {
                name: name.to_string(),
                actual: format!("{}x{}", actual.width(), actual.height()),
                baseline: format!("{}x{}", baseline.width(), baseline.height()),
            });
        }

        let (diff_pixels, overlay) =
            diff_images(&actual, &baseline, self.config.channel_tolerance);
        let total_pixels = u64::from(actual.width()) * u64::from(actual.height());
        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(format!("{name}-diff.png"));
            overlay.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "'{name}': {diff_percent:.2}% of pixels differ (threshold {threshold:.2}%)"
            );
        }

        Ok(VisualDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image,
        })
    }

    /// Promote the captured screenshot to baseline.
    pub fn update_baseline(&self, name: &str) -> HarnessResult<()> {
        let actual_path = self.actual_path(name);
        if !actual_path.exists() {
            return Err(HarnessError::AssertionFailed(format!(
                "cannot promote '{name}': no captured screenshot at {}",
                actual_path.display()
            )));
        }
        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("baseline updated: {name}");
        Ok(())
    }

    /// Promote every captured screenshot to baseline.
    pub fn update_all(&self) -> HarnessResult<Vec<String>> {
        let mut updated = Vec::new();
        for name in png_stems(&self.config.actual_dir)? {
            self.update_baseline(&name)?;
            updated.push(name);
        }
        Ok(updated)
    }

    pub fn list_baselines(&self) -> HarnessResult<Vec<String>> {
        png_stems(&self.config.baseline_dir)
    }

    fn actual_path(&self, name: &str) -> PathBuf {
        self.config.actual_dir.join(format!("{name}.png"))
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(format!("{name}.png"))
    }
}

/// Pixel-walk two same-sized images. Returns the differing pixel count and
/// an overlay image: dimmed original with differing pixels marked red.
pub fn diff_images(actual: &RgbaImage, baseline: &RgbaImage, tolerance: u8) -> (u64, RgbaImage) {
    let (width, height) = actual.dimensions();
    let mut overlay = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = actual.get_pixel(x, y).0;
            let b = baseline.get_pixel(x, y).0;
            let differs = a
                .iter()
                .zip(b.iter())
                .any(|(&ac, &bc)| ac.abs_diff(bc) > tolerance);
            if differs {
                diff_pixels += 1;
                overlay.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
            } else {
                overlay.put_pixel(x, y, image::Rgba([a[0] / 2, a[1] / 2, a[2] / 2, 128]));
            }
        }
    }

    (diff_pixels, overlay)
}

fn file_sha256(path: &Path) -> HarnessResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn png_stems(dir: &Path) -> HarnessResult<Vec<String>> {
    let mut stems = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "png").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                stems.push(stem.to_string_lossy().to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba))
    }

    fn tester(dir: &Path, auto_update: bool) -> VisualTester {
        VisualTester::new(VisualConfig {
            baseline_dir: dir.join("baseline"),
            actual_dir: dir.join("actual"),
            diff_dir: dir.join("diff"),
            auto_update,
            ..VisualConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn identical_images_match() {
        let tmp = tempfile::tempdir().unwrap();
        let t = tester(tmp.path(), false);
        let img = solid(8, 8, [10, 20, 30, 255]);
        img.save(tmp.path().join("actual/shot.png")).unwrap();
        img.save(tmp.path().join("baseline/shot.png")).unwrap();

        let diff = t.compare("shot", None).unwrap();
        assert!(diff.matches);
        assert_eq!(diff.diff_pixels, 0);
    }

    #[test]
    fn changed_region_fails_threshold_and_writes_overlay() {
        let tmp = tempfile::tempdir().unwrap();
        let t = tester(tmp.path(), false);

        let baseline = solid(10, 10, [0, 0, 0, 255]);
        let mut actual = baseline.clone();
        for y in 0..5 {
            for x in 0..10 {
                actual.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
            }
        }
        actual.save(tmp.path().join("actual/panel.png")).unwrap();
        baseline.save(tmp.path().join("baseline/panel.png")).unwrap();

        let diff = t.compare("panel", Some(1.0)).unwrap();
        assert!(!diff.matches);
        assert_eq!(diff.diff_pixels, 50);
        assert!((diff.diff_percent - 50.0).abs() < 1e-9);
        assert!(diff.diff_image.unwrap().exists());
    }

    #[test]
    fn tolerance_absorbs_small_drift() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [103, 98, 100, 255]);
        let (diff_pixels, _) = diff_images(&a, &b, 5);
        assert_eq!(diff_pixels, 0);

        let (diff_pixels, _) = diff_images(&a, &b, 1);
        assert_eq!(diff_pixels, 16);
    }

    #[test]
    fn dimension_change_is_a_hard_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let t = tester(tmp.path(), false);
        solid(10, 10, [1, 2, 3, 255])
            .save(tmp.path().join("actual/hero.png"))
            .unwrap();
        solid(12, 10, [1, 2, 3, 255])
            .save(tmp.path().join("baseline/hero.png"))
            .unwrap();

        let err = t.compare("hero", None).unwrap_err();
        assert!(matches!(err, HarnessError::ScreenshotDimensions { .. }));
    }

    #[test]
    fn missing_baseline_adopted_when_auto_update() {
        let tmp = tempfile::tempdir().unwrap();
        let t = tester(tmp.path(), true);
        solid(4, 4, [9, 9, 9, 255])
            .save(tmp.path().join("actual/feed.png"))
            .unwrap();

        let diff = t.compare("feed", None).unwrap();
        assert!(diff.matches);
        assert!(tmp.path().join("baseline/feed.png").exists());
        assert_eq!(t.list_baselines().unwrap(), vec!["feed"]);
    }

    #[test]
    fn missing_baseline_is_reported_otherwise() {
        let tmp = tempfile::tempdir().unwrap();
        let t = tester(tmp.path(), false);
        solid(4, 4, [9, 9, 9, 255])
            .save(tmp.path().join("actual/feed.png"))
            .unwrap();

        let err = t.compare("feed", None).unwrap_err();
        assert!(matches!(err, HarnessError::BaselineNotFound(_)));
    }
}
