//! Common test utilities for agent integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webpilot_agent::{
    Actuator, AgentLoop, AgentSettings, ConfirmationRequest, Confirmer, DecisionOracle,
    DecisionPrompt, EnvError, EnvResult, FullSnapshot, Link, QuickSnapshot, Sensor, TabInfo,
};

mock! {
    pub Oracle {}

    #[async_trait]
    impl DecisionOracle for Oracle {
        async fn decide(&self, prompt: &DecisionPrompt) -> webpilot_agent::Result<String>;
        async fn assess_destructiveness(
            &self,
            action: &str,
            context_summary: &str,
        ) -> webpilot_agent::Result<String>;
    }
}

/// Oracle that replays `replies` in order, then repeats `fallback`
pub fn scripted_oracle(replies: &[&str], fallback: &str) -> MockOracle {
    let queue: Mutex<VecDeque<String>> =
        Mutex::new(replies.iter().map(|r| r.to_string()).collect());
    let fallback = fallback.to_string();

    let mut oracle = MockOracle::new();
    oracle.expect_decide().returning(move |_| {
        Ok(queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| fallback.clone()))
    });
    oracle
}

pub const CLICK_NEXT: &str = r#"{"action":"click","reasoning":"go to the next page","text":"Next"}"#;
pub const DONE: &str =
    r#"{"action":"complete","reasoning":"all steps done","is_complete":true,"summary":"done"}"#;
pub const WAIT: &str = r#"{"action":"wait","reasoning":"page loading"}"#;

/// Confirmer with a fixed answer that records what it was asked
pub struct ScriptedConfirmer {
    answer: Option<String>,
    pub requests: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedConfirmer {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn asked(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}

/// In-memory environment with scripted failures
pub struct FakeEnv {
    pub quick_error: Mutex<Option<EnvError>>,
    pub full_errors: Mutex<VecDeque<EnvError>>,
    pub action_errors: Mutex<VecDeque<Option<EnvError>>>,
    pub tabs: Mutex<Vec<TabInfo>>,
    pub calls: Mutex<Vec<String>>,
    pub full_calls: AtomicUsize,
    pub url: Mutex<String>,
}

impl Default for FakeEnv {
    fn default() -> Self {
        Self {
            quick_error: Mutex::new(None),
            full_errors: Mutex::new(VecDeque::new()),
            action_errors: Mutex::new(VecDeque::new()),
            tabs: Mutex::new(vec![tab("t1", "Start", true)]),
            calls: Mutex::new(Vec::new()),
            full_calls: AtomicUsize::new(0),
            url: Mutex::new("https://start.example".to_string()),
        }
    }
}

impl FakeEnv {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next actions in order; `None` entries succeed
    pub fn with_action_errors(errors: Vec<Option<EnvError>>) -> Arc<Self> {
        let env = Self::default();
        *env.action_errors.lock().unwrap() = errors.into();
        Arc::new(env)
    }

    pub fn with_tabs(tabs: Vec<TabInfo>) -> Arc<Self> {
        let env = Self::default();
        *env.tabs.lock().unwrap() = tabs;
        Arc::new(env)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn full_calls(&self) -> usize {
        self.full_calls.load(Ordering::SeqCst)
    }

    fn act(&self, call: String) -> EnvResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.action_errors.lock().unwrap().pop_front() {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

pub fn tab(id: &str, title: &str, is_active: bool) -> TabInfo {
    TabInfo {
        id: id.to_string(),
        title: title.to_string(),
        is_active,
    }
}

#[async_trait]
impl Sensor for FakeEnv {
    async fn quick_snapshot(&self) -> EnvResult<QuickSnapshot> {
        if let Some(err) = self.quick_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(QuickSnapshot {
            url: self.url.lock().unwrap().clone(),
            title: "Start".to_string(),
            links: vec![Link {
                text: "About".to_string(),
                href: "/about".to_string(),
            }],
            buttons: vec!["Next".to_string()],
        })
    }

    async fn full_snapshot(&self) -> EnvResult<FullSnapshot> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.full_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(FullSnapshot {
            url: self.url.lock().unwrap().clone(),
            title: "Start".to_string(),
            text: "Welcome".to_string(),
            ..Default::default()
        })
    }

    async fn current_url(&self) -> EnvResult<String> {
        Ok(self.url.lock().unwrap().clone())
    }
}

#[async_trait]
impl Actuator for FakeEnv {
    async fn navigate(&self, url: &str) -> EnvResult<()> {
        self.act(format!("navigate {}", url))?;
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn click_by_text(&self, text: &str) -> EnvResult<()> {
        self.act(format!("click_text {}", text))
    }

    async fn click_by_selector(&self, selector: &str) -> EnvResult<()> {
        self.act(format!("click_selector {}", selector))
    }

    async fn fill_by_placeholder(&self, label: &str, value: &str) -> EnvResult<()> {
        self.act(format!("fill_placeholder {}={}", label, value))
    }

    async fn fill_by_selector(&self, selector: &str, value: &str) -> EnvResult<()> {
        self.act(format!("fill_selector {}={}", selector, value))
    }

    async fn press_key(&self, key: &str) -> EnvResult<()> {
        self.act(format!("press {}", key))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EnvResult<()> {
        self.act(format!("wait {} {}s", selector, timeout.as_secs()))
    }

    async fn list_tabs(&self) -> EnvResult<Vec<TabInfo>> {
        Ok(self.tabs.lock().unwrap().clone())
    }

    async fn switch_to_tab(&self, id: &str) -> EnvResult<()> {
        self.act(format!("switch {}", id))?;
        for tab in self.tabs.lock().unwrap().iter_mut() {
            tab.is_active = tab.id == id;
        }
        Ok(())
    }

    async fn close_tab(&self, id: &str) -> EnvResult<()> {
        self.act(format!("close {}", id))?;
        self.tabs.lock().unwrap().retain(|tab| tab.id != id);
        Ok(())
    }
}

/// Settings with every pause removed
pub fn fast_settings() -> AgentSettings {
    AgentSettings::default().without_pauses()
}

pub fn agent(
    env: Arc<FakeEnv>,
    oracle: MockOracle,
    confirmer: Arc<ScriptedConfirmer>,
    settings: AgentSettings,
) -> AgentLoop<FakeEnv, MockOracle> {
    AgentLoop::new(env, Arc::new(oracle), confirmer, settings)
}
