//! Context builder for assembling decision prompts

use chrono::Local;
use std::fmt::Write;

use crate::environment::{FullSnapshot, PageSnapshot, QuickSnapshot};
use crate::state::History;
use crate::strategy::TaskStrategy;

/// System and user halves of one decision request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPrompt {
    pub system: String,
    pub user: String,
}

/// Builds bounded prompts from task, history and page state
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_window: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(7)
    }
}

impl ContextBuilder {
    const MAX_LINKS: usize = 15;
    const MAX_TEXT_CHARS: usize = 3000;
    const MAX_LISTS: usize = 3;
    const MAX_TABLES: usize = 2;
    const MAX_ROWS: usize = 5;

    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Build the full prompt, letting the strategy tailor the system half
    pub fn build(
        &self,
        task: &str,
        history: &History,
        snapshot: &PageSnapshot,
        strategy: &dyn TaskStrategy,
    ) -> DecisionPrompt {
        DecisionPrompt {
            system: strategy.system_prompt(&self.base_system_prompt()),
            user: self.user_prompt(task, history, snapshot),
        }
    }

    /// Action vocabulary and response format
    pub fn base_system_prompt(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");

        format!(
            r#"# WebPilot

You are WebPilot, an autonomous agent that operates a web browser to carry out the user's task.
Analyse the current page and decide the single next action on your own, without canned plans or selectors.

## Current Time
{}

## Actions
1. navigate - open a URL. Fill "url" with a link from the page or a direct address such as "https://mail.google.com".
2. click - click an element. Fill "text" with visible text from the buttons or links list; use "selector" only if text does not work.
3. fill - type into an input. Fill "text" with the label, placeholder or name from the inputs list, and "value" with what to type. Generic words like "search" locate search boxes. Use "selector" + "value" only if text does not work.
4. press_key - press a key. Fill "key" (enter, escape, delete, tab, ...).
5. switch_tab - switch to a tab. Fill "tab_index" (1, 2, 3, ...).
6. close_tab - close a tab. Fill "tab_index".
7. wait - wait. Optionally fill "wait_for" with a selector.
8. extract - read information from the page (already done automatically).
9. complete - the task is done. Set "is_complete": true and describe the result in "summary".

If you cannot continue without the user (login, captcha, a choice only they can make), set "needs_input": true and explain in "input_prompt".

## Rules
- Do not report completion just because a link is missing; navigate to a direct URL instead.
- Use only data from the current page.
- Reply with a single JSON object and nothing before or after it.

## Format
{{
  "action": "click",
  "reasoning": "why this step",
  "text": "button or link text"
}}"#,
            now
        )
    }

    /// Task, recent history and the page, bounded in size
    pub fn user_prompt(&self, task: &str, history: &History, snapshot: &PageSnapshot) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Task: {}\n", task);

        if !history.is_empty() {
            out.push_str("Recent actions:\n");
            for entry in history.recent(self.history_window) {
                let _ = writeln!(out, "- {}", entry);
            }
            out.push('\n');
        }

        out.push_str("Current page:\n");
        match snapshot {
            PageSnapshot::Quick(quick) => Self::render_quick(&mut out, quick),
            PageSnapshot::Full(full) => Self::render_full(&mut out, full),
        }

        out.push_str("\nWhat is the next action? Reply in JSON.");
        out
    }

    fn render_quick(out: &mut String, page: &QuickSnapshot) {
        let _ = writeln!(out, "URL: {}", page.url);
        let _ = writeln!(out, "Title: {}", page.title);

        if !page.links.is_empty() {
            let _ = writeln!(out, "\nLinks (first {}):", Self::MAX_LINKS);
            for link in page.links.iter().take(Self::MAX_LINKS) {
                let _ = writeln!(out, "  - {} -> {}", link.text, link.href);
            }
        }

        if !page.buttons.is_empty() {
            out.push_str("\nButtons:\n");
            for button in &page.buttons {
                let _ = writeln!(out, "  - {}", button);
            }
        }
    }

    fn render_full(out: &mut String, page: &FullSnapshot) {
        let _ = writeln!(out, "URL: {}", page.url);
        let _ = writeln!(out, "Title: {}", page.title);

        if !page.headings.is_empty() {
            out.push_str("\nHeadings:\n");
            for heading in &page.headings {
                let _ = writeln!(out, "  {}: {}", heading.level, heading.text);
            }
        }

        if !page.buttons.is_empty() {
            out.push_str("\nButtons:\n");
            for button in &page.buttons {
                let _ = writeln!(out, "  - {}", button.text);
            }
        }

        if !page.links.is_empty() {
            let _ = writeln!(out, "\nLinks (first {}):", Self::MAX_LINKS);
            for link in page.links.iter().take(Self::MAX_LINKS) {
                let _ = writeln!(out, "  - {} -> {}", link.text, link.href);
            }
        }

        if !page.inputs.is_empty() {
            out.push_str("\nInputs:\n");
            for input in &page.inputs {
                let _ = writeln!(out, "  - {} ({})", input.display_label(), input.kind);
            }
        }

        if !page.text.is_empty() {
            let _ = writeln!(out, "\nPage text:\n{}", preview(&page.text, Self::MAX_TEXT_CHARS));
        }

        if !page.lists.is_empty() {
            out.push_str("\nLists:\n");
            for list in page.lists.iter().take(Self::MAX_LISTS) {
                for item in list.iter().take(Self::MAX_ROWS) {
                    let _ = writeln!(out, "  - {}", item);
                }
            }
        }

        if !page.tables.is_empty() {
            out.push_str("\nTables:\n");
            for table in page.tables.iter().take(Self::MAX_TABLES) {
                for row in table.iter().take(Self::MAX_ROWS) {
                    let _ = writeln!(out, "  {}", row.join(" | "));
                }
            }
        }
    }
}

/// First `limit` characters, with an ellipsis when cut
fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_counts_characters() {
        assert_eq!(preview("привет", 3), "при...");
        assert_eq!(preview("abc", 3), "abc");
        assert_eq!(preview("", 3), "");
    }

    #[test]
    fn test_system_prompt_lists_actions() {
        let prompt = ContextBuilder::default().base_system_prompt();
        for action in ["navigate", "click", "fill", "press_key", "switch_tab", "close_tab", "complete"] {
            assert!(prompt.contains(action), "missing {}", action);
        }
        assert!(prompt.contains("## Current Time"));
    }
}
