//! Terminal confirmation for destructive actions

use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};
use webpilot_agent::{ConfirmationRequest, Confirmer};

use crate::input::LineReader;

/// Asks on stdout and takes the answer from the shared terminal input
pub struct StdinConfirmer {
    lines: Arc<LineReader>,
}

impl StdinConfirmer {
    pub fn new(lines: Arc<LineReader>) -> Self {
        Self { lines }
    }
}

pub fn render_request(request: &ConfirmationRequest) -> String {
    let mut out = String::from("\n⚠ Potentially destructive action\n");
    out.push_str(&format!("  Action:  {}\n", request.action));
    if let Some(element) = &request.element {
        out.push_str(&format!("  Element: {}\n", element));
    }
    out.push_str(&format!("  Effect:  {}\n", request.description));
    out.push_str(&format!("{} [yes/no] ", request.question));
    out
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<String> {
        // a line typed before the question was asked is not an answer
        let stale = self.lines.discard_pending().await;
        if stale > 0 {
            debug!("Discarded {} line(s) typed before the prompt", stale);
        }

        let mut stdout = std::io::stdout();
        if let Err(e) = stdout
            .write_all(render_request(request).as_bytes())
            .and_then(|_| stdout.flush())
        {
            warn!("Confirmation prompt failed: {}", e);
            return None;
        }

        self.lines.next_line().await.map(|l| l.trim().to_string())
    }
}
