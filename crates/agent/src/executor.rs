//! Action executor: one validated decision, one environment operation

use std::time::Duration;
use tracing::{debug, info};

use crate::decision::{Action, Decision, Target};
use crate::environment::{Actuator, TabInfo};
use crate::{AgentError, Result};

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    wait_timeout: Duration,
    wait_pause: Duration,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(2))
    }
}

impl ActionExecutor {
    pub fn new(wait_timeout: Duration, wait_pause: Duration) -> Self {
        Self {
            wait_timeout,
            wait_pause,
        }
    }

    /// Validate the payload, then perform the action
    ///
    /// Field errors are returned before the environment is touched.
    pub async fn execute<A>(&self, env: &A, decision: &Decision) -> Result<()>
    where
        A: Actuator + ?Sized,
    {
        match decision.to_action()? {
            Action::Navigate { url } => {
                let url = normalize_url(&url);
                info!("◆ Navigating to {}", url);
                env.navigate(&url).await?;
            }
            Action::Click(Target::Text(text)) => {
                info!("◆ Clicking text '{}'", text);
                env.click_by_text(&text).await?;
            }
            Action::Click(Target::Selector(selector)) => {
                info!("◆ Clicking selector '{}'", selector);
                env.click_by_selector(&selector).await?;
            }
            Action::Fill {
                target: Target::Selector(selector),
                value,
            } => {
                info!("◆ Filling '{}'", selector);
                env.fill_by_selector(&selector, &value).await?;
            }
            Action::Fill {
                target: Target::Text(label),
                value,
            } => {
                info!("◆ Filling field labelled '{}'", label);
                env.fill_by_placeholder(&label, &value).await?;
            }
            Action::PressKey { key } => {
                info!("◆ Pressing {}", key);
                env.press_key(&key).await?;
            }
            Action::SwitchTab { index } => {
                let tabs = env.list_tabs().await?;
                let target = tab_at(&tabs, index)?;
                info!("◆ Switching to tab {}: {}", index, target.title);
                env.switch_to_tab(&target.id).await?;
            }
            Action::CloseTab { index } => self.close_tab(env, index).await?,
            Action::Wait {
                selector: Some(selector),
            } => {
                debug!("Waiting for '{}'", selector);
                env.wait_for_selector(&selector, self.wait_timeout).await?;
            }
            Action::Wait { selector: None } => {
                debug!("Waiting {:?}", self.wait_pause);
                tokio::time::sleep(self.wait_pause).await;
            }
            Action::Extract => debug!("Extract: page content is already in context"),
            Action::Complete => debug!("Complete is handled by the loop"),
        }
        Ok(())
    }

    async fn close_tab<A>(&self, env: &A, index: usize) -> Result<()>
    where
        A: Actuator + ?Sized,
    {
        let tabs = env.list_tabs().await?;
        let target = tab_at(&tabs, index)?;
        if tabs.len() == 1 {
            return Err(AgentError::Rejected(
                "cannot close the only open tab".to_string(),
            ));
        }

        if target.is_active {
            // the first tab hands focus to the second, any other to the first
            let fallback = if index == 1 { &tabs[1] } else { &tabs[0] };
            env.switch_to_tab(&fallback.id).await?;
        }

        info!("◆ Closing tab {}: {}", index, target.title);
        env.close_tab(&target.id).await?;
        Ok(())
    }
}

/// 1-based tab lookup
fn tab_at(tabs: &[TabInfo], index: usize) -> Result<&TabInfo> {
    index
        .checked_sub(1)
        .and_then(|i| tabs.get(i))
        .ok_or_else(|| AgentError::InvalidField {
            field: "tab_index",
            reason: format!("tab {} does not exist ({} open)", index, tabs.len()),
        })
}

/// Add `https://` to bare domains like `example.com`
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    if !has_scheme && url.contains('.') && !url.contains(' ') {
        format!("https://{}", url)
    } else {
        url.to_string()
    }
}
