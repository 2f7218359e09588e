//! trellis-gateway - session-multiplexed stream routing core for Trellis
//!
//! This crate provides:
//! - A stream transport representing one server-push channel per client
//! - A concurrency-safe session registry correlating streams with requests
//! - Declarative argument schemas validated before dispatch
//! - A command router that replies onto the originating stream

pub mod router;
pub mod schema;
pub mod session;
pub mod transport;

pub use router::{
    CommandDescriptor, CommandHandler, CommandReply, CommandRouter, DispatchError, HandlerError,
    RouterError, REPLY_EVENT,
};
pub use schema::{ArgValue, CommandArgs, CommandSchema, FieldDef, FieldKind, ValidationError};
pub use session::{Session, SessionRegistry};
pub use transport::{
    DisconnectGuard, FrameReceiver, StreamFrame, StreamMessage, StreamTransport, TransportError,
};

/// Re-export async_trait for handler implementers
pub use async_trait::async_trait;
