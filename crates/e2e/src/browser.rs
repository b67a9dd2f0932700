//! Playwright session compiler and Node runner.
//!
//! A whole scenario is compiled into a single Node script so the browser
//! session survives across steps; localStorage seeds, dismissed modals and
//! tab state all have to persist into later steps. The script reports back
//! over stdout as JSON event lines behind a sentinel prefix.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::scenario::{Scenario, Step, WaitState};

/// Sentinel in front of every event line the generated script prints.
pub const EVENT_PREFIX: &str = "@@qv ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Chromium => "chromium",
            Engine::Firefox => "firefox",
            Engine::Webkit => "webkit",
        }
    }

}

impl std::str::FromStr for Engine {
    type Err = HarnessError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "chromium" => Ok(Engine::Chromium),
            "firefox" => Ok(Engine::Firefox),
            "webkit" => Ok(Engine::Webkit),
            other => Err(HarnessError::UnknownEngine(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Origin of the app under test, without trailing slash.
    pub base_url: String,
    /// Where the generated script writes screenshots.
    pub screenshot_dir: PathBuf,
    pub engine: Engine,
    pub headless: bool,
    /// Working directory for `node`, so a local `node_modules/playwright`
    /// resolves.
    pub node_cwd: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            screenshot_dir: PathBuf::from("verification/actual"),
            engine: Engine::Chromium,
            headless: true,
            node_cwd: PathBuf::from("."),
        }
    }
}

/// One parsed event line from the session script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptEvent {
    Step(StepEvent),
    Fatal {
        fatal: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screenshot: Option<String>,
    },
    Console {
        console: String,
    },
    Done {
        done: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step: usize,
    pub name: String,
    pub ok: bool,
    #[serde(default)]
    pub ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page HTML, shipped back for `assert_content` steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Result of an `evaluate` step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Screenshot name captured by this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot: Option<String>,
}

/// Compiles and runs one browser session per scenario.
pub struct BrowserSession {
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn new(config: BrowserConfig) -> HarnessResult<Self> {
        check_playwright_installed(&config.node_cwd)?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self { config })
    }

    /// Skip the install probe; used by tests that only compile scripts.
    pub fn new_unchecked(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Compile the scenario into a standalone Playwright Node script.
    pub fn build_script(&self, scenario: &Scenario, now: DateTime<Utc>) -> HarnessResult<String> {
        let mut js = String::new();

        let locale = match &scenario.locale {
            Some(locale) => format!("\n    locale: {},", js_str(locale)),
            None => String::new(),
        };

        let _ = write!(
            js,
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

const emit = (event) => console.log('{prefix}' + JSON.stringify(event));

(async () => {{
  const browser = await {engine}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},{locale}
  }});
  const page = await context.newPage();
  page.on('console', (msg) => emit({{ console: msg.text() }}));
  const base = {base};

  try {{
"#,
            prefix = EVENT_PREFIX,
            engine = self.config.engine.as_str(),
            headless = self.config.headless,
            width = scenario.viewport.width,
            height = scenario.viewport.height,
            locale = locale,
            base = js_str(&self.config.base_url),
        );

        for (index, step) in scenario.steps.iter().enumerate() {
            let body = self.step_body(step, now)?;
            let _ = write!(
                js,
                r#"
    // Step {num}: {label}
    {{
      const t0 = Date.now();
      const extra = {{}};
      try {{
{body}
        emit({{ step: {index}, name: {name}, ok: true, ms: Date.now() - t0, ...extra }});
      }} catch (err) {{
        emit({{ step: {index}, name: {name}, ok: false, ms: Date.now() - t0, error: String((err && err.message) || err) }});
        throw err;
      }}
    }}
"#,
                num = index + 1,
                label = step.label().replace('\n', " "),
                index = index,
                name = js_str(&step.label()),
                body = indent(&body, 8),
            );
        }

        let error_shot = self
            .config
            .screenshot_dir
            .join(format!("{}-error.png", scenario.name));
        let _ = write!(
            js,
            r#"
    emit({{ done: true }});
  }} catch (err) {{
    const message = String((err && err.message) || err);
    try {{
      await page.screenshot({{ path: {shot_path}, fullPage: true }});
      emit({{ fatal: message, screenshot: {shot_name} }});
    }} catch (_) {{
      emit({{ fatal: message }});
    }}
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            shot_path = js_str(&error_shot.to_string_lossy()),
            shot_name = js_str(&format!("{}-error", scenario.name)),
        );

        Ok(js)
    }

    fn step_body(&self, step: &Step, now: DateTime<Utc>) -> HarnessResult<String> {
        let code = match step {
            Step::Navigate { path, wait_for } => {
                let mut code = format!("await page.goto(base + {});", js_str(path));
                if let Some(selector) = wait_for {
                    let _ = write!(code, "\nawait page.waitForSelector({});", js_str(selector));
                }
                code
            }
            Step::SeedStorage { seed, before_load } => {
                let entries = seed.entries(now)?;
                let payload = serde_json::to_string(&entries)?;
                let writer = "(entries) => { for (const [key, value] of entries) localStorage.setItem(key, value); }";
                if *before_load {
                    format!("await context.addInitScript({writer}, {payload});")
                } else {
                    format!("await page.evaluate({writer}, {payload});")
                }
            }
            Step::Reload { wait_for } => {
                let mut code = "await page.reload();".to_string();
                if let Some(selector) = wait_for {
                    let _ = write!(code, "\nawait page.waitForSelector({});", js_str(selector));
                }
                code
            }
            Step::EnterApiKey { key } => format!(
                r##"if (await page.locator("#modal-apikey").isVisible().catch(() => false)) {{
  await page.fill("#inp-apikey", {key});
  await page.click("button:has-text(\"Salvar e Iniciar\")");
  await page.locator("#modal-apikey").waitFor({{ state: 'hidden', timeout: 5000 }});
}}"##,
                key = js_str(key),
            ),
            Step::CompleteOnboarding {
                name,
                weight,
                height,
                age,
            } => format!(
                r##"if (await page.locator("#onboarding-overlay").isVisible().catch(() => false)) {{
  await page.fill("#onb-name", {name});
  await page.fill("#onb-weight", {weight});
  await page.fill("#onb-height", {height});
  await page.fill("#onb-age", {age});
  await page.click("button:has-text(\"Começar Jornada\")");
  await page.waitForTimeout(1000);
}}"##,
                name = js_str(name),
                weight = js_str(&weight.to_string()),
                height = js_str(&height.to_string()),
                age = js_str(&age.to_string()),
            ),
            Step::AddMeal { meal } => {
                let doc = meal.resolve(now)?;
                format!(
                    "await page.evaluate((meal) => {{ App.addMealToDB(meal); }}, {});",
                    serde_json::to_string(&doc)?
                )
            }
            Step::SwitchTab { tab } => format!(
                "await page.evaluate((tab) => {{ App.switchTab(tab); }}, {});",
                js_str(tab)
            ),
            Step::Click {
                selector,
                timeout_ms,
            } => format!(
                "await page.click({}, {{ timeout: {} }});",
                js_str(selector),
                timeout_ms.unwrap_or(5000)
            ),
            Step::Fill { selector, value } => {
                format!("await page.fill({}, {});", js_str(selector), js_str(value))
            }
            Step::Wait {
                selector,
                timeout_ms,
                state,
            } => {
                let state = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                    js_str(selector),
                    state,
                    timeout_ms
                )
            }
            Step::Sleep { ms } => format!("await page.waitForTimeout({ms});"),
            Step::ScrollIntoView { selector } => format!(
                "await page.locator({}).first().scrollIntoViewIfNeeded();",
                js_str(selector)
            ),
            Step::Assert {
                selector,
                visible,
                text,
                text_contains,
                count,
                min_count,
            } => {
                let mut code = format!("const loc = page.locator({});", js_str(selector));
                if let Some(expected) = visible {
                    let _ = write!(
                        code,
                        r#"
const visible = await loc.first().isVisible().catch(() => false);
if (visible !== {expected}) throw new Error({msg} + visible);"#,
                        expected = expected,
                        msg = js_str(&format!("expected visible={} for {}, got ", expected, selector)),
                    );
                }
                if text.is_some() || text_contains.is_some() {
                    code.push_str("\nconst text = (await loc.first().innerText()).trim();");
                }
                if let Some(expected) = text {
                    let _ = write!(
                        code,
                        "\nif (text !== {expected}) throw new Error({msg} + JSON.stringify(text));",
                        expected = js_str(expected),
                        msg = js_str(&format!("expected text {:?} for {}, got ", expected, selector)),
                    );
                }
                if let Some(expected) = text_contains {
                    let _ = write!(
                        code,
                        "\nif (!text.includes({expected})) throw new Error({msg} + JSON.stringify(text));",
                        expected = js_str(expected),
                        msg = js_str(&format!("expected text containing {:?} in {}, got ", expected, selector)),
                    );
                }
                if count.is_some() || min_count.is_some() {
                    code.push_str("\nconst n = await loc.count();");
                }
                if let Some(expected) = count {
                    let _ = write!(
                        code,
                        "\nif (n !== {expected}) throw new Error({msg} + n);",
                        expected = expected,
                        msg = js_str(&format!("expected {} matches for {}, got ", expected, selector)),
                    );
                }
                if let Some(minimum) = min_count {
                    let _ = write!(
                        code,
                        "\nif (n < {minimum}) throw new Error({msg} + n);",
                        minimum = minimum,
                        msg = js_str(&format!("expected at least {} matches for {}, got ", minimum, selector)),
                    );
                }
                code
            }
            Step::AssertContent { .. } => {
                // Patterns are evaluated host-side; the script only ships
                // the rendered HTML back.
                "extra.content = await page.content();".to_string()
            }
            Step::Screenshot {
                name,
                selector,
                full_page,
            } => {
                let path = self.config.screenshot_dir.join(format!("{name}.png"));
                let path = js_str(&path.to_string_lossy());
                let mut code = match selector {
                    Some(selector) => format!(
                        "await page.locator({}).first().screenshot({{ path: {path} }});",
                        js_str(selector)
                    ),
                    None => format!(
                        "await page.screenshot({{ path: {path}, fullPage: {full_page} }});"
                    ),
                };
                let _ = write!(code, "\nextra.shot = {};", js_str(name));
                code
            }
            Step::Evaluate { script, .. } => {
                format!("extra.value = await page.evaluate({script});")
            }
            Step::Log { message } => format!("emit({{ console: {} }});", js_str(message)),
        };
        Ok(code)
    }

    /// Run the scenario and return the parsed event stream.
    pub async fn run(&self, scenario: &Scenario) -> HarnessResult<Vec<ScriptEvent>> {
        let script = self.build_script(scenario, Utc::now())?;

        let staging = tempfile::tempdir()?;
        let script_path = staging.path().join(format!("{}.js", scenario.name));
        std::fs::write(&script_path, &script)?;

        debug!(scenario = %scenario.name, path = %script_path.display(), "running session script");

        let output = tokio::process::Command::new("node")
            .arg(&script_path)
            .current_dir(&self.config.node_cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HarnessError::Session("node not found on PATH".to_string())
                } else {
                    HarnessError::Io(e)
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let events = parse_events(&stdout);

        if events.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Session(format!(
                "session produced no events (exit {:?})\nstdout: {}\nstderr: {}",
                output.status.code(),
                stdout.trim(),
                stderr.trim()
            )));
        }

        if !output.status.success() && !has_failure(&events) {
            warn!(
                scenario = %scenario.name,
                "node exited nonzero without a failure event"
            );
        }

        Ok(events)
    }
}

/// Parse sentinel-prefixed JSON event lines out of session stdout.
pub fn parse_events(stdout: &str) -> Vec<ScriptEvent> {
    stdout
        .lines()
        .filter_map(|line| {
            let payload = line.trim().strip_prefix(EVENT_PREFIX.trim_end())?;
            match serde_json::from_str(payload.trim()) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("unparsable event line: {e}");
                    None
                }
            }
        })
        .collect()
}

fn has_failure(events: &[ScriptEvent]) -> bool {
    events.iter().any(|e| match e {
        ScriptEvent::Step(step) => !step.ok,
        ScriptEvent::Fatal { .. } => true,
        _ => false,
    })
}

fn check_playwright_installed(node_cwd: &std::path::Path) -> HarnessResult<()> {
    let status = std::process::Command::new("npx")
        .args(["playwright", "--version"])
        .current_dir(node_cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(HarnessError::PlaywrightNotFound),
    }
}

/// Embed a Rust string as a quoted, escaped JS string literal.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn indent(code: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    code.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
