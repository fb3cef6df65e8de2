//! Environment interfaces: the sensor that snapshots the page and the
//! actuator that operates on it
//!
//! One control loop drives a given environment at a time. Implementations are
//! not required to serialise concurrent mutating calls; the keep-alive prober
//! only ever calls [`Sensor::current_url`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("environment closed")]
    Closed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not actionable: {0}")]
    NotActionable(String),

    #[error("{0}")]
    Failed(String),
}

impl EnvError {
    /// Worth retrying locally
    pub fn is_transient(&self) -> bool {
        matches!(self, EnvError::Timeout(_))
    }
}

pub type EnvResult<T> = std::result::Result<T, EnvError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Cheap snapshot: location plus a bounded list of links and button labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickSnapshot {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl Input {
    /// Most human-readable identifier: label, placeholder, name, then id
    pub fn display_label(&self) -> &str {
        [&self.label, &self.placeholder, &self.name, &self.id]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: String,
    pub text: String,
}

/// Rich snapshot of the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullSnapshot {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub lists: Vec<Vec<String>>,
    #[serde(default)]
    pub tables: Vec<Vec<Vec<String>>>,
}

/// Snapshot at whichever fidelity the sensor managed to produce
#[derive(Debug, Clone, PartialEq)]
pub enum PageSnapshot {
    Quick(QuickSnapshot),
    Full(FullSnapshot),
}

impl PageSnapshot {
    pub fn url(&self) -> &str {
        match self {
            PageSnapshot::Quick(s) => &s.url,
            PageSnapshot::Full(s) => &s.url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PageSnapshot::Quick(s) => &s.title,
            PageSnapshot::Full(s) => &s.title,
        }
    }

    /// One-line summary used for destructiveness assessment
    pub fn summary(&self) -> String {
        format!("URL: {}, Title: {}", self.url(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub title: String,
    pub is_active: bool,
}

/// Read-only view of the environment
#[async_trait]
pub trait Sensor: Send + Sync {
    async fn quick_snapshot(&self) -> EnvResult<QuickSnapshot>;
    async fn full_snapshot(&self) -> EnvResult<FullSnapshot>;
    async fn current_url(&self) -> EnvResult<String>;
}

/// Mutating operations; every failure names its target
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn navigate(&self, url: &str) -> EnvResult<()>;
    async fn click_by_text(&self, text: &str) -> EnvResult<()>;
    async fn click_by_selector(&self, selector: &str) -> EnvResult<()>;
    async fn fill_by_placeholder(&self, label: &str, value: &str) -> EnvResult<()>;
    async fn fill_by_selector(&self, selector: &str, value: &str) -> EnvResult<()>;
    async fn press_key(&self, key: &str) -> EnvResult<()>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> EnvResult<()>;
    async fn list_tabs(&self) -> EnvResult<Vec<TabInfo>>;
    async fn switch_to_tab(&self, id: &str) -> EnvResult<()>;
    async fn close_tab(&self, id: &str) -> EnvResult<()>;
}

/// Full environment handle
pub trait Environment: Sensor + Actuator {}

impl<T: Sensor + Actuator> Environment for T {}
