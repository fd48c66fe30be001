// src/conditions/mod.rs
//! Trigger conditions for buffered recording
//!
//! While buffering, every appended record is offered to an evaluator. The
//! first non-`None` answer names the trigger and commits the session to
//! delivery.

use crate::messages::{EventKind, EventRecord};
use serde::Deserialize;

/// Pure function from a record to an optional trigger name
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, record: &EventRecord) -> Option<String>;
}

impl<F> ConditionEvaluator for F
where
    F: Fn(&EventRecord) -> Option<String> + Send + Sync,
{
    fn evaluate(&self, record: &EventRecord) -> Option<String> {
        self(record)
    }
}

/// A single predicate over records
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Any crash
    Crash,

    /// Custom event with this exact name
    EventName { name: String },

    /// Network call whose status is at least `status`
    NetworkStatusAtLeast { status: u64 },

    /// Network call whose URL contains `fragment`
    NetworkUrlContains { fragment: String },

    /// Log line containing `fragment`
    LogContains { fragment: String },

    /// Click on an element with this exact label
    ClickLabel { label: String },

    /// Metadata entry with `key`, optionally with `value`
    Metadata { key: String, value: Option<String> },
}

impl Condition {
    pub fn matches(&self, record: &EventRecord) -> bool {
        match &record.kind {
            EventKind::Crash { .. } => matches!(self, Condition::Crash),
            EventKind::Event { name, .. } => {
                matches!(self, Condition::EventName { name: wanted } if wanted == name)
            }
            EventKind::NetworkCall { url, status, .. } => match self {
                Condition::NetworkStatusAtLeast { status: min } => status >= min,
                Condition::NetworkUrlContains { fragment } => url.contains(fragment.as_str()),
                _ => false,
            },
            EventKind::Log { content, .. } => match self {
                Condition::LogContains { fragment } => content.contains(fragment.as_str()),
                _ => false,
            },
            EventKind::Click { label, .. } => {
                matches!(self, Condition::ClickLabel { label: wanted } if wanted == label)
            }
            EventKind::Metadata { key, value } => match self {
                Condition::Metadata {
                    key: wanted_key,
                    value: wanted_value,
                } => {
                    wanted_key == key
                        && wanted_value.as_ref().map_or(true, |wanted| wanted == value)
                }
                _ => false,
            },
            EventKind::UserId { .. }
            | EventKind::UserAnonymousId { .. }
            | EventKind::ScreenChange { .. }
            | EventKind::ViewComponent { .. }
            | EventKind::Input { .. }
            | EventKind::Performance { .. }
            | EventKind::InternalError { .. }
            | EventKind::Swipe { .. }
            | EventKind::BatchMeta { .. }
            | EventKind::GraphQl { .. } => false,
        }
    }
}

/// Named condition
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionRule {
    pub name: String,
    pub condition: Condition,
}

/// Ordered rule list; the first matching rule names the trigger
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    rules: Vec<ConditionRule>,
}

impl ConditionSet {
    pub fn new(rules: Vec<ConditionRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl ConditionEvaluator for ConditionSet {
    fn evaluate(&self, record: &EventRecord) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| rule.condition.matches(record))
            .map(|rule| rule.name.clone())
    }
}
