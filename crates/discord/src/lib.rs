//! Discord interface for crewbot
//!
//! - **Commands** (`commands`) - handlers keyed by command name, `!hello`, `/ask`, ...
//! - **Events** (`events`) - interactions and prefixed messages routed to the command dispatcher
//! - **Replies** (`replies`) - reply text builders
//! - **Gateway** (`gateway`) - event loop with reconnection logic over a transport seam
//! - **Slash** (`slash`) - application command definitions registered on ready
//! - **Websocket** (`websocket`) - the real gateway connection plus REST replies
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → CommandDispatcher → Registry / external APIs
//!    ↑                                                   ↓
//!    └─────────────────────── Reply ←────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - pumps events and sends one reply per dispatched command
//! - `EventDispatcher` - routes inbound events by kind
//! - `CommandDispatcher` - routes invocations by command name; never fails
//! - `CommandHandler` - trait implemented by every command

pub mod commands;
pub mod events;
pub mod gateway;
pub mod replies;
pub mod slash;
pub mod websocket;

pub use commands::{
    default_command_dispatcher, Caller, CommandArgs, CommandDispatcher, CommandHandler,
    CommandInvocation, CommandServices,
};
pub use events::{default_dispatcher, DiscordEnvelope, DiscordEvent, EventDispatcher, ReplyTarget};
pub use gateway::{
    GatewayError, GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy,
};
pub use replies::Reply;
pub use slash::{slash_commands, SlashCommand};
pub use websocket::DiscordGatewayTransport;
