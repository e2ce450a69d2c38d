use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Identifier of a notification action.
///
/// `Default` is the action invoked by tapping the notification body;
/// `Custom` actions are rendered as buttons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionId {
    Default,
    Custom(String),
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionId::Default => write!(f, "default"),
            ActionId::Custom(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for ActionId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "default" => ActionId::Default,
            s => ActionId::Custom(s.to_string()),
        })
    }
}

/// An action offered on a notification card, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: ActionId,
    pub label: String,
}

impl NotificationAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            // Infallible by construction
            id: id.parse().unwrap_or(ActionId::Custom(id)),
            label: label.into(),
        }
    }

    pub fn estimated_size(&self) -> usize {
        let id_len = match &self.id {
            ActionId::Default => 7,
            ActionId::Custom(s) => s.len(),
        };
        id_len + self.label.len() + 16
    }
}

/// Cap the number of actions rendered on a single card.
///
/// Insertion order is preserved; actions past the cap are dropped.
pub fn limit_actions(actions: &[NotificationAction], max: usize) -> Vec<NotificationAction> {
    actions.iter().take(max).cloned().collect()
}
