//! Outcome of a command broker invocation.

use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::error::CommandError;

/// Terminal outcome of one command. Exactly one per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandOutcome {
    Accepted,
    /// The command failed validation.
    Invalid,
    NotFound,
    /// Stale version, duplicate creation, or a state that forbids the command.
    Conflict,
    /// No processing is registered for the command kind.
    NotHandled,
    /// The store kept failing after bounded retries.
    Unavailable,
    /// The caller cancelled before anything was persisted.
    Cancelled,
}

impl CommandOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOutcome::Accepted => "accepted",
            CommandOutcome::Invalid => "invalid",
            CommandOutcome::NotFound => "not_found",
            CommandOutcome::Conflict => "conflict",
            CommandOutcome::NotHandled => "not_handled",
            CommandOutcome::Unavailable => "unavailable",
            CommandOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&CommandError> for CommandOutcome {
    fn from(e: &CommandError) -> Self {
        match e {
            CommandError::Invalid(_) => CommandOutcome::Invalid,
            CommandError::NotFound(_) => CommandOutcome::NotFound,
            CommandError::Conflict(_) => CommandOutcome::Conflict,
        }
    }
}

/// What the broker returns for every command, successful or not.
#[derive(Debug, Clone)]
pub struct CommandResult<A: Aggregate> {
    pub outcome: CommandOutcome,

    /// State after the command. Only set when accepted.
    pub entity: Option<A>,

    /// Events emitted and persisted. Empty for no-op commands.
    pub events: Vec<A::Event>,

    /// Aggregate version after the command, when accepted.
    pub version: Option<Version>,

    pub errors: Vec<String>,
}

impl<A: Aggregate> CommandResult<A> {
    pub fn accepted(entity: A, events: Vec<A::Event>) -> Self {
        Self {
            outcome: CommandOutcome::Accepted,
            version: Some(entity.version()),
            entity: Some(entity),
            events,
            errors: Vec::new(),
        }
    }

    pub fn rejected(outcome: CommandOutcome, errors: Vec<String>) -> Self {
        Self {
            outcome,
            entity: None,
            events: Vec::new(),
            version: None,
            errors,
        }
    }

    pub fn failed(outcome: CommandOutcome, error: impl ToString) -> Self {
        Self::rejected(outcome, vec![error.to_string()])
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == CommandOutcome::Accepted
    }

    pub fn into_entity(self) -> Option<A> {
        self.entity
    }
}

impl<A: Aggregate> From<CommandError> for CommandResult<A> {
    fn from(e: CommandError) -> Self {
        Self::rejected(CommandOutcome::from(&e), e.messages())
    }
}
