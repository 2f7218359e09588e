//! Command routing
//!
//! Validates inbound submissions, invokes the command's handler and pushes
//! the framed reply onto the originating session's stream. The submitting
//! request only learns whether dispatch was accepted; every command outcome,
//! success or failure, travels back as exactly one stream frame.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::schema::{CommandArgs, CommandSchema};
use crate::session::SessionRegistry;
use crate::transport::{StreamMessage, TransportError};

/// Event name used for command reply frames.
pub const REPLY_EVENT: &str = "message";

/// A command's business logic.
///
/// Implementations call the external executor; failures come back as text
/// and are routed to the client exactly like a successful result.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, args: CommandArgs) -> Result<String, HandlerError>;
}

/// Failure produced by a command handler, carried as text to the client.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Immutable description of a registered command.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub schema: CommandSchema,
}

struct RegisteredCommand {
    descriptor: CommandDescriptor,
    handler: Arc<dyn CommandHandler>,
}

/// Reply pushed onto the stream for one submitted command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub command: String,
    pub success: bool,
    pub text: String,
}

impl CommandReply {
    pub fn success(command: &str, text: impl Into<String>) -> Self {
        Self {
            command: command.to_string(),
            success: true,
            text: text.into(),
        }
    }

    pub fn failure(command: &str, text: impl Into<String>) -> Self {
        Self {
            command: command.to_string(),
            success: false,
            text: text.into(),
        }
    }

    /// Frame the reply as a single stream message.
    pub fn into_message(self) -> StreamMessage {
        let data = serde_json::to_string(&self).unwrap_or_default();
        StreamMessage::new(REPLY_EVENT, data)
    }
}

/// Routes submitted commands to their handlers.
///
/// The session registry is injected explicitly so tests can substitute their
/// own and server instances never share state implicitly.
pub struct CommandRouter {
    commands: DashMap<String, Arc<RegisteredCommand>>,
    registry: Arc<SessionRegistry>,
}

impl CommandRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            commands: DashMap::new(),
            registry,
        }
    }

    /// Register a command. Registration happens once at startup; a duplicate
    /// name is a wiring bug and fails instead of silently overwriting.
    pub fn register(
        &self,
        descriptor: CommandDescriptor,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RouterError> {
        match self.commands.entry(descriptor.name.clone()) {
            Entry::Occupied(entry) => Err(RouterError::DuplicateCommand(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(command = %descriptor.name, "registered command");
                entry.insert(Arc::new(RegisteredCommand {
                    descriptor,
                    handler,
                }));
                Ok(())
            }
        }
    }

    /// Names of all registered commands, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Dispatch one submitted command.
    ///
    /// An unknown command name or invalid arguments become a routed failure
    /// reply on the session's stream. An unknown session rejects the whole
    /// dispatch with no push and no handler call. A transport that closed
    /// while the handler was running is logged, never propagated.
    pub async fn dispatch(
        &self,
        session_id: &str,
        name: &str,
        raw_args: &Value,
    ) -> Result<(), DispatchError> {
        // Resolve and validate up front; neither step performs I/O, so a
        // doomed submission never reaches the executor.
        let prepared = match self.commands.get(name) {
            None => Err(format!("Unknown command: {}", name)),
            Some(entry) => match entry.descriptor.schema.validate(raw_args) {
                Ok(args) => Ok((Arc::clone(entry.value()), args)),
                Err(e) => Err(format!("Invalid arguments for '{}': {}", name, e)),
            },
        };

        let transport = self
            .registry
            .lookup(session_id)
            .ok_or_else(|| DispatchError::SessionNotFound(session_id.to_string()))?;

        // No registry lock is held across this await; a slow executor call
        // must never stall session lookups for other requests.
        let reply = match prepared {
            Err(failure) => CommandReply::failure(name, failure),
            Ok((command, args)) => match command.handler.run(args).await {
                Ok(text) => CommandReply::success(name, text),
                Err(e) => CommandReply::failure(name, e.to_string()),
            },
        };

        match transport.push(reply.into_message()) {
            Ok(()) => debug!(session_id, command = name, "reply pushed"),
            Err(TransportError::Closed) => {
                // The session closed mid-dispatch; the entry is already gone
                // and the reply has nowhere to go.
                warn!(
                    session_id,
                    command = name,
                    "session closed before reply could be pushed"
                );
            }
        }
        Ok(())
    }
}

/// Registration-time errors.
#[derive(Debug, Error, PartialEq)]
pub enum RouterError {
    #[error("Duplicate command: {0}")]
    DuplicateCommand(String),
}

/// Dispatch-time rejections reported to the submitting request.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}
