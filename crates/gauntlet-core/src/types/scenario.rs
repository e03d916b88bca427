//! Scripted multi-turn scenarios

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GauntletError, GauntletResult};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Scripted message sent to the model
    User,
    /// Model response (or a scripted prior response replayed as history)
    Agent,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Agent => write!(f, "agent"),
        }
    }
}

/// One step of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who speaks
    pub role: TurnRole,

    /// Message text
    pub message: String,

    /// Hints the response is expected to act on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_task_hints: Vec<String>,
}

impl Turn {
    /// Create a user turn
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            message: message.into(),
            expected_task_hints: Vec::new(),
        }
    }

    /// Create an agent turn
    pub fn agent(message: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            message: message.into(),
            expected_task_hints: Vec::new(),
        }
    }

    /// Attach expected task hints
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_task_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this turn is sent to the model
    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User
    }
}

/// A file whose content is given to the model with the first turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Display path
    pub path: String,

    /// File content, passed verbatim
    pub content: String,
}

/// A scripted conversation used as a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Role the model is asked to play
    #[serde(default = "default_agent_role")]
    pub agent_role: String,

    /// Turns in execution order
    pub turns: Vec<Turn>,

    /// Files attached to the first user turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<ContextFile>,
}

fn default_agent_role() -> String {
    "assistant".to_string()
}

impl Scenario {
    /// Create a scenario with no turns
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent_role: default_agent_role(),
            turns: Vec::new(),
            context_files: Vec::new(),
        }
    }

    /// Set the agent role
    pub fn with_agent_role(mut self, role: impl Into<String>) -> Self {
        self.agent_role = role.into();
        self
    }

    /// Append a turn
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Attach a context file
    pub fn with_context_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.context_files.push(ContextFile {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    /// Number of turns sent to the model
    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.is_user()).count()
    }

    /// Context files concatenated verbatim, or `None` if there are none
    pub fn context_preamble(&self) -> Option<String> {
        if self.context_files.is_empty() {
            return None;
        }

        let mut preamble = String::new();
        for file in &self.context_files {
            preamble.push_str(&format!("--- {} ---\n", file.path));
            preamble.push_str(&file.content);
            if !file.content.ends_with('\n') {
                preamble.push('\n');
            }
        }
        Some(preamble)
    }

    /// Check that the scenario can be executed
    pub fn validate(&self) -> GauntletResult<()> {
        if self.id.trim().is_empty() {
            return Err(GauntletError::scenario_logic("scenario id is empty"));
        }
        if self.user_turn_count() == 0 {
            return Err(GauntletError::scenario_logic(format!(
                "scenario '{}' has no user turns",
                self.id
            )));
        }
        Ok(())
    }
}
