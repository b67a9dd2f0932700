//! The bundled scenario pack must always load and compile.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use quantix_e2e::browser::{BrowserConfig, BrowserSession};
use quantix_e2e::scenario::{Scenario, Step};

fn pack_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .canonicalize()
        .expect("scenario pack directory")
}

fn load_pack() -> Vec<Scenario> {
    Scenario::load_dir(&pack_dir()).expect("scenario pack loads")
}

#[test]
fn pack_contains_every_verification_flow() {
    let names: HashSet<String> = load_pack().into_iter().map(|s| s.name).collect();
    for expected in [
        "macro-rounding",
        "language-toggle",
        "i18n-snapshot",
        "analytics-dashboard",
        "analytics-charts",
        "planner-simplify",
    ] {
        assert!(names.contains(expected), "missing scenario: {expected}");
    }
}

#[test]
fn every_scenario_compiles_to_a_session_script() {
    let session = BrowserSession::new_unchecked(BrowserConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    for scenario in load_pack() {
        let script = session
            .build_script(&scenario, now)
            .unwrap_or_else(|e| panic!("{} failed to compile: {e}", scenario.name));
        assert!(script.contains("require('playwright')"));
        assert!(script.contains(&format!("{}-error.png", scenario.name)));
    }
}

#[test]
fn screenshot_names_are_unique_across_the_pack() {
    let mut seen = HashSet::new();
    for scenario in load_pack() {
        for name in scenario.screenshot_names() {
            assert!(
                seen.insert(name.clone()),
                "screenshot name '{name}' reused; baselines would collide"
            );
        }
    }
}

#[test]
fn macro_rounding_checks_the_rounded_string() {
    let pack = load_pack();
    let scenario = pack
        .iter()
        .find(|s| s.name == "macro-rounding")
        .expect("macro-rounding present");

    let content_step = scenario
        .steps
        .iter()
        .find_map(|s| match s {
            Step::AssertContent {
                contains,
                not_matches,
                ..
            } => Some((contains, not_matches)),
            _ => None,
        })
        .expect("content assertion present");

    assert!(content_step.0.contains(&"P:21 C:30 G:11".to_string()));
    assert_eq!(content_step.1.len(), 2);
}

#[test]
fn planner_seed_round_trips_the_slot_map() {
    let pack = load_pack();
    let scenario = pack
        .iter()
        .find(|s| s.name == "planner-simplify")
        .expect("planner-simplify present");

    let seed = scenario
        .steps
        .iter()
        .find_map(|s| match s {
            Step::SeedStorage { seed, .. } => Some(seed),
            _ => None,
        })
        .expect("seed step present");

    let planner = seed.planner.as_ref().expect("planner fixture");
    assert_eq!(planner[0].day, "Segunda-feira");
    assert_eq!(planner[0].meals.len(), 4);
    assert_eq!(planner[0].meals["breakfast"].estimated_cals, 500);

    let entries = seed
        .entries(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        .unwrap();
    assert!(entries
        .iter()
        .any(|(k, v)| k == "quantix_ultimate_v2_planner" && v.contains("Complex Meal")));
}
