//! Chrome-backed environment for the WebPilot agent
//!
//! Wraps a `headless_chrome` session. The CDP client is blocking, so every
//! call runs on the blocking pool.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use webpilot_agent::{
    Actuator, EnvError, EnvResult, FullSnapshot, QuickSnapshot, Sensor, TabInfo,
};
use webpilot_config::Config;

pub mod scripts;

use scripts::LookupOutcome;

/// How to start the browser
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    pub user_data_dir: PathBuf,
    pub start_url: String,
    /// Chrome drops an idle CDP connection after this long
    pub idle_timeout: Duration,
}

impl LaunchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.browser.headless,
            user_data_dir: config.user_data_dir(),
            start_url: config.browser.start_url.clone(),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Map a CDP failure onto the environment error taxonomy
pub fn classify_error(target: &str, message: &str) -> EnvError {
    let lower = message.to_lowercase();
    if lower.contains("never came") || lower.contains("timed out") || lower.contains("timeout") {
        EnvError::Timeout(target.to_string())
    } else if lower.contains("no element")
        || lower.contains("could not find")
        || lower.contains("couldn't find")
        || lower.contains("not found")
    {
        EnvError::NotFound(target.to_string())
    } else if lower.contains("connection closed")
        || lower.contains("channel closed")
        || lower.contains("target closed")
        || lower.contains("disconnected")
    {
        EnvError::Closed
    } else {
        EnvError::Failed(format!("{}: {}", target, message))
    }
}

fn cdp_error(target: &str) -> impl Fn(anyhow::Error) -> EnvError + '_ {
    move |err| classify_error(target, &err.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> EnvResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| EnvError::Failed("browser state lock poisoned".to_string()))
}

/// Run a script that returns a string
fn eval_string(tab: &Tab, script: &str, target: &str) -> EnvResult<String> {
    let result = tab.evaluate(script, false).map_err(cdp_error(target))?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default())
}

/// Decode a snapshot script result
pub fn parse_snapshot<T: DeserializeOwned>(raw: &str, target: &str) -> EnvResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| EnvError::Failed(format!("{}: malformed result: {}", target, e)))
}

fn lookup_result(raw: &str, target: String) -> EnvResult<()> {
    match LookupOutcome::parse(raw) {
        Some(LookupOutcome::Done) => Ok(()),
        Some(LookupOutcome::Hidden) => Err(EnvError::NotActionable(target)),
        Some(LookupOutcome::NotFound) => Err(EnvError::NotFound(target)),
        None => Err(EnvError::Failed(format!("{}: unexpected result '{}'", target, raw))),
    }
}

/// Browser session implementing the agent's sensor and actuator
pub struct ChromeEnvironment {
    browser: Mutex<Option<Browser>>,
    active: Mutex<Option<Arc<Tab>>>,
    closed: AtomicBool,
}

impl ChromeEnvironment {
    /// Launch Chrome with a persistent profile and open the start page
    pub async fn launch(settings: LaunchSettings) -> EnvResult<Self> {
        info!(
            "◆ launching browser (headless: {}, profile: {:?})",
            settings.headless, settings.user_data_dir
        );

        let (browser, tab) = tokio::task::spawn_blocking(move || -> EnvResult<_> {
            std::fs::create_dir_all(&settings.user_data_dir).map_err(|e| {
                EnvError::Failed(format!("profile directory {:?}: {}", settings.user_data_dir, e))
            })?;

            let options = LaunchOptions {
                headless: settings.headless,
                user_data_dir: Some(settings.user_data_dir.clone()),
                window_size: Some((1280, 900)),
                args: vec![
                    OsStr::new("--no-first-run"),
                    OsStr::new("--no-default-browser-check"),
                    OsStr::new("--disable-blink-features=AutomationControlled"),
                ],
                idle_browser_timeout: settings.idle_timeout,
                ..Default::default()
            };
            let browser = Browser::new(options).map_err(cdp_error("browser launch"))?;
            let tab = browser.new_tab().map_err(cdp_error("new tab"))?;

            if !settings.start_url.is_empty() {
                tab.navigate_to(&settings.start_url)
                    .and_then(|t| t.wait_until_navigated())
                    .map_err(cdp_error(&settings.start_url))?;
            }
            Ok((browser, tab))
        })
        .await
        .map_err(|e| EnvError::Failed(format!("browser launch: {}", e)))??;

        info!("◆ browser ready");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            active: Mutex::new(Some(tab)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut the browser down; further calls fail with `Closed`
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let browser = self.browser.lock().ok().and_then(|mut b| b.take());
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
        if let Some(browser) = browser {
            info!("◆ closing browser");
            // dropping the handle kills the Chrome process
            if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
                warn!("Browser shutdown failed: {}", e);
            }
        }
    }

    /// Release the handle but leave the Chrome window running
    pub fn detach(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
        if let Some(browser) = self.browser.lock().ok().and_then(|mut b| b.take()) {
            info!("◆ leaving browser open");
            std::mem::forget(browser);
        }
    }

    fn ensure_open(&self) -> EnvResult<()> {
        if self.is_closed() {
            Err(EnvError::Closed)
        } else {
            Ok(())
        }
    }

    fn active_tab(&self) -> EnvResult<Arc<Tab>> {
        self.ensure_open()?;
        lock(&self.active)?.clone().ok_or(EnvError::Closed)
    }

    fn all_tabs(&self) -> EnvResult<Vec<Arc<Tab>>> {
        self.ensure_open()?;
        let browser = lock(&self.browser)?;
        let browser = browser.as_ref().ok_or(EnvError::Closed)?;
        let tabs = lock(browser.get_tabs().as_ref())?.clone();
        Ok(tabs)
    }

    fn find_tab(&self, id: &str) -> EnvResult<Arc<Tab>> {
        self.all_tabs()?
            .into_iter()
            .find(|t| t.get_target_id().as_str() == id)
            .ok_or_else(|| EnvError::NotFound(format!("tab {}", id)))
    }

    /// Run `f` against the active tab on the blocking pool
    async fn on_tab<T, F>(&self, what: &str, f: F) -> EnvResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> EnvResult<T> + Send + 'static,
    {
        let tab = self.active_tab()?;
        let result = tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| EnvError::Failed(format!("{}: {}", what, e)))?;

        // a closed connection surfaces as a failed call; remember it
        if matches!(result, Err(EnvError::Closed)) {
            warn!("Browser connection lost during {}", what);
            self.closed.store(true, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl Sensor for ChromeEnvironment {
    async fn quick_snapshot(&self) -> EnvResult<QuickSnapshot> {
        self.on_tab("quick snapshot", |tab| {
            let raw = eval_string(tab, &scripts::quick_snapshot(), "quick snapshot")?;
            parse_snapshot(&raw, "quick snapshot")
        })
        .await
    }

    async fn full_snapshot(&self) -> EnvResult<FullSnapshot> {
        self.on_tab("full snapshot", |tab| {
            let raw = eval_string(tab, &scripts::full_snapshot(), "full snapshot")?;
            parse_snapshot(&raw, "full snapshot")
        })
        .await
    }

    async fn current_url(&self) -> EnvResult<String> {
        self.on_tab("current url", |tab| {
            eval_string(tab, scripts::CURRENT_URL, "current url")
        })
        .await
    }
}

#[async_trait]
impl Actuator for ChromeEnvironment {
    async fn navigate(&self, url: &str) -> EnvResult<()> {
        debug!("Navigate: {}", url);
        let url = url.to_string();
        self.on_tab("navigate", move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(cdp_error(&url))?;
            Ok(())
        })
        .await
    }

    async fn click_by_text(&self, text: &str) -> EnvResult<()> {
        debug!("Click by text: {}", text);
        let text = text.to_string();
        self.on_tab("click", move |tab| {
            let target = format!("element with text '{}'", text);
            let raw = eval_string(tab, &scripts::click_by_text(&text), &target)?;
            lookup_result(&raw, target)
        })
        .await
    }

    async fn click_by_selector(&self, selector: &str) -> EnvResult<()> {
        debug!("Click by selector: {}", selector);
        let selector = selector.to_string();
        self.on_tab("click", move |tab| {
            let target = format!("selector '{}'", selector);
            let element = tab.find_element(&selector).map_err(cdp_error(&target))?;
            element.click().map_err(cdp_error(&target))?;
            Ok(())
        })
        .await
    }

    async fn fill_by_placeholder(&self, label: &str, value: &str) -> EnvResult<()> {
        debug!("Fill by label: {}", label);
        let (label, value) = (label.to_string(), value.to_string());
        self.on_tab("fill", move |tab| {
            let target = format!("field '{}'", label);
            let raw = eval_string(tab, &scripts::fill_by_placeholder(&label, &value), &target)?;
            lookup_result(&raw, target)
        })
        .await
    }

    async fn fill_by_selector(&self, selector: &str, value: &str) -> EnvResult<()> {
        debug!("Fill by selector: {}", selector);
        let (selector, value) = (selector.to_string(), value.to_string());
        self.on_tab("fill", move |tab| {
            let target = format!("selector '{}'", selector);
            let element = tab.find_element(&selector).map_err(cdp_error(&target))?;
            element.click().map_err(cdp_error(&target))?;
            eval_string(tab, &scripts::clear_field(&selector), &target)?;
            tab.type_str(&value).map_err(cdp_error(&target))?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, key: &str) -> EnvResult<()> {
        debug!("Press key: {}", key);
        let key = key.to_string();
        self.on_tab("press key", move |tab| {
            tab.press_key(&key)
                .map_err(cdp_error(&format!("key '{}'", key)))?;
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EnvResult<()> {
        let selector = selector.to_string();
        self.on_tab("wait", move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(cdp_error(&format!("selector '{}'", selector)))?;
            Ok(())
        })
        .await
    }

    async fn list_tabs(&self) -> EnvResult<Vec<TabInfo>> {
        let tabs = self.all_tabs()?;
        let active_id = self
            .active_tab()?
            .get_target_id()
            .to_string();

        tokio::task::spawn_blocking(move || {
            tabs.iter()
                .map(|tab| {
                    let id = tab.get_target_id().to_string();
                    TabInfo {
                        title: tab.get_title().unwrap_or_default(),
                        is_active: id == active_id,
                        id,
                    }
                })
                .collect()
        })
        .await
        .map_err(|e| EnvError::Failed(format!("list tabs: {}", e)))
    }

    async fn switch_to_tab(&self, id: &str) -> EnvResult<()> {
        let tab = self.find_tab(id)?;
        let target = format!("tab {}", id);
        let focused = tab.clone();
        tokio::task::spawn_blocking(move || {
            focused.activate().map_err(cdp_error(&target))?;
            Ok::<_, EnvError>(())
        })
        .await
        .map_err(|e| EnvError::Failed(format!("switch tab: {}", e)))??;

        *lock(&self.active)? = Some(tab);
        debug!("Switched to tab {}", id);
        Ok(())
    }

    async fn close_tab(&self, id: &str) -> EnvResult<()> {
        let tab = self.find_tab(id)?;
        let target = format!("tab {}", id);
        tokio::task::spawn_blocking(move || {
            tab.close(true).map_err(cdp_error(&target))?;
            Ok::<_, EnvError>(())
        })
        .await
        .map_err(|e| EnvError::Failed(format!("close tab: {}", e)))??;

        let mut active = lock(&self.active)?;
        if active
            .as_ref()
            .is_some_and(|t| t.get_target_id().as_str() == id)
        {
            *active = self
                .all_tabs()?
                .into_iter()
                .find(|t| t.get_target_id().as_str() != id);
        }
        debug!("Closed tab {}", id);
        Ok(())
    }
}
