//! History log configuration.
//!
//! Lives under the `history:` key of `marsim-config.yaml`.

use marsim_types::{HistoricalEventCategory, HistoricalEventType};
use serde::Deserialize;

use crate::event::HistoricalEvent;

/// Settings for the [`HistoricalEventManager`](crate::HistoricalEventManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of records kept; the oldest is evicted beyond this.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Categories dropped on registration as noise.
    #[serde(default = "default_ignored_categories")]
    pub ignored_categories: Vec<HistoricalEventCategory>,

    /// Individual event types dropped on registration as noise.
    #[serde(default)]
    pub ignored_types: Vec<HistoricalEventType>,
}

impl HistoryConfig {
    /// Whether an event is configured as noise.
    pub fn is_ignored(&self, event: &HistoricalEvent) -> bool {
        self.ignored_categories.contains(&event.category)
            || self.ignored_types.contains(&event.event_type)
    }

    /// The capacity actually used (never zero).
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ignored_categories: default_ignored_categories(),
            ignored_types: Vec::new(),
        }
    }
}

const fn default_capacity() -> usize {
    50
}

fn default_ignored_categories() -> Vec<HistoricalEventCategory> {
    vec![HistoricalEventCategory::Task]
}
