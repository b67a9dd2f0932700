//! Typed fixture documents matching the storage shapes the Quantix app reads.
//!
//! The app persists JSON documents in localStorage under the
//! `quantix_ultimate_v2_` key prefix. Field names here mirror the app's own
//! (mixed camelCase and snake_case), so YAML fixtures are written exactly as
//! the app would store them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;

/// Key prefix the app uses for every persisted document.
pub const STORAGE_PREFIX: &str = "quantix_ultimate_v2_";

/// The language selection is stored outside the prefixed namespace.
pub const LANG_KEY: &str = "quantix_lang";

/// User profile document (`<prefix>profile`).
///
/// Seeding one with `onboardingDone: true` is how scenarios bypass the
/// onboarding overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFixture {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Daily calorie target.
    pub target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    #[serde(default = "default_true")]
    pub onboarding_done: bool,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_usage: Option<ApiUsage>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsage {
    pub total_tokens: u64,
    pub total_requests: u64,
}

/// Macro breakdown of a meal. The app renders these rounded to integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroSplit {
    pub p: f64,
    pub c: f64,
    pub f: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fib: Option<f64>,
}

/// A meal entry as stored in the `<prefix>meals` array.
///
/// `id`, `timestamp` and `dateKey` may be omitted in fixtures; they are
/// resolved to "now" when the seed is expanded, matching what
/// `App.addMealToDB` would fill in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealFixture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_key: Option<String>,
    pub desc: String,
    pub cals: f64,
    pub macros: MacroSplit,
    pub category: String,
    #[serde(rename = "type", default = "default_meal_type")]
    pub meal_type: String,
    pub score: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub micros: BTreeMap<String, f64>,
}

fn default_meal_type() -> String {
    "food".to_string()
}

impl MealFixture {
    /// Produce the JSON document the app expects, filling in any omitted
    /// identity and time fields from `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> HarnessResult<serde_json::Value> {
        let mut doc = serde_json::to_value(self)?;
        let millis = now.timestamp_millis();
        if let Some(map) = doc.as_object_mut() {
            map.entry("id").or_insert_with(|| millis.into());
            map.entry("timestamp").or_insert_with(|| millis.into());
            map.entry("dateKey")
                .or_insert_with(|| now.format("%Y-%m-%d").to_string().into());
        }
        Ok(doc)
    }
}

/// One planned day in the `<prefix>planner` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerDayFixture {
    /// Display label, e.g. "Segunda-feira".
    pub day: String,
    /// Slot name (breakfast/lunch/snack/dinner) to planned meal.
    pub meals: BTreeMap<String, PlannerMealFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerMealFixture {
    pub desc: String,
    pub estimated_cals: u32,
}

/// A complete storage seed: every document a scenario wants persisted
/// before (or after) the app boots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSeed {
    /// Override the key prefix. Defaults to [`STORAGE_PREFIX`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileFixture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals: Option<Vec<MealFixture>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner: Option<Vec<PlannerDayFixture>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Value for the unprefixed `quantix_lang` key, e.g. "pt-BR".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Raw passthrough entries, stored under their literal keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StorageSeed {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(STORAGE_PREFIX)
    }

    /// Expand into concrete `(key, value)` localStorage pairs.
    pub fn entries(&self, now: DateTime<Utc>) -> HarnessResult<Vec<(String, String)>> {
        let prefix = self.prefix();
        let mut entries = Vec::new();

        if let Some(profile) = &self.profile {
            entries.push((
                format!("{prefix}profile"),
                serde_json::to_string(profile)?,
            ));
        }
        if let Some(meals) = &self.meals {
            let docs = meals
                .iter()
                .map(|m| m.resolve(now))
                .collect::<HarnessResult<Vec<_>>>()?;
            entries.push((
                format!("{prefix}meals"),
                serde_json::to_string(&docs)?,
            ));
        }
        if let Some(planner) = &self.planner {
            entries.push((
                format!("{prefix}planner"),
                serde_json::to_string(planner)?,
            ));
        }
        if let Some(key) = &self.api_key {
            // Stored as a bare string, not JSON-encoded.
            entries.push((format!("{prefix}api_key"), key.clone()));
        }
        if let Some(lang) = &self.lang {
            entries.push((LANG_KEY.to_string(), lang.clone()));
        }
        for (key, value) in &self.extra {
            let stored = match value {
                serde_json::Value::String(s) => s.clone(),
                other => serde_json::to_string(other)?,
            };
            entries.push((key.clone(), stored));
        }

        Ok(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_none()
            && self.meals.is_none()
            && self.planner.is_none()
            && self.api_key.is_none()
            && self.lang.is_none()
            && self.extra.is_empty()
    }
}
