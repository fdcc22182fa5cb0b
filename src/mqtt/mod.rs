//! # MQTT Integration Module
//!
//! Messaging collaborator for the telemetry programs: broker connection, outbound
//! publish/subscribe requests and the queue of inbound messages.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings and telemetry topic names
//! ├── message_manager.rs  - Inbound message type and the per-tick inbox
//! └── mqtt_handler.rs     - Link lifecycle (statum) and the Messenger trait
//! ```
//!
//! The network I/O runs on a background task owned by [`MqttLink`]. It never
//! touches domain state; it only appends to the [`Inbox`].

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;

pub use config::{MqttConfig, TelemetryTopics};
pub use message_manager::{InboundMessage, Inbox};
pub use mqtt_handler::{Messenger, MessagingError, MqttLink};
