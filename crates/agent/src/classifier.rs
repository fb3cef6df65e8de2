//! Task classification
//!
//! An ordered rule table over the lowercased task text. Rules are checked top
//! to bottom and the first match wins; nothing matching means `Generic`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    Generic,
    Email,
    Shopping,
    JobSearch,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Generic => "generic",
            TaskCategory::Email => "email",
            TaskCategory::Shopping => "shopping",
            TaskCategory::JobSearch => "job_search",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the rule table: any keyword selects the category
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub category: TaskCategory,
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new(category: TaskCategory, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, task: &str) -> bool {
        self.keywords.iter().any(|k| task.contains(k.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct TaskClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for TaskClassifier {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new(
                TaskCategory::Email,
                &["mail", "inbox", "spam", "почт", "письм"],
            ),
            ClassificationRule::new(
                TaskCategory::Shopping,
                &["order", "buy", "cart", "food delivery", "закажи", "купи", "корзин"],
            ),
            ClassificationRule::new(
                TaskCategory::JobSearch,
                &["vacanc", "job", "resume", "hh.ru", "ваканси", "резюме"],
            ),
        ])
    }
}

impl TaskClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, task: &str) -> TaskCategory {
        let task = task.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&task))
            .map(|rule| rule.category)
            .unwrap_or_default()
    }
}
