//! Quantix verification engine
//!
//! Rust-controlled browser verification for the Quantix nutrition PWA.
//! Scenarios are declarative YAML; each one compiles to a single headless
//! Playwright session that seeds the app's localStorage fixtures, drives
//! the UI, and streams structured events back for scoring.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Runner (Rust)                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  AppServer        serve app bundle | attach to origin        │
//! │  Scenario (YAML)  seed_storage / enter_api_key /             │
//! │                   complete_onboarding / add_meal / assert…   │
//! │  BrowserSession   scenario ──compile──▶ Node script          │
//! │                   stdout ──parse──▶ ScriptEvent stream       │
//! │  collate_events   host-side content/evaluate assertions      │
//! │  VisualTester     screenshot baselines, pixel diff           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The app under test is a black box; the engine only relies on its
//! external contracts: the `quantix_ultimate_v2_` storage namespace, a
//! fixed set of DOM ids and button labels, and the global `App` object.

pub mod browser;
pub mod error;
pub mod fixtures;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod visual;

pub use error::{HarnessError, HarnessResult};
pub use runner::{Runner, RunnerConfig, ScenarioReport, SuiteReport};
pub use scenario::{Scenario, Step};
