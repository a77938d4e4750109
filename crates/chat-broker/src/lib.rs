//! chat-broker library crate.
//!
//! This crate provides the broker core of a small real-time chat system:
//! clients connect over TCP, claim a nickname, and exchange direct messages
//! that the broker routes through a shared registry of online sessions.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (newline-delimited JSON over TCP)
//!         ↕
//! [chat-broker]
//!   ├── domain/           Pure types: BrokerConfig
//!   ├── application/      Session, Registry, Router, HeartbeatMonitor,
//!   │                     ConnectionHandler (login + dispatch state machine)
//!   └── infrastructure/
//!         ├── listener/   TCP accept loop, one task per connection
//!         ├── stream/     FrameSink / FrameSource over tokio streams
//!         └── storage/    TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` talks to connections only through the [`FrameSink`] and
//!   [`FrameSource`] traits, so every use case can be tested without sockets.
//! - `infrastructure` depends on all other layers plus `tokio::net`.
//!
//! [`FrameSink`]: application::session::FrameSink
//! [`FrameSource`]: application::connection::FrameSource

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: registry, routing, heartbeat, and per-connection logic.
pub mod application;

/// Infrastructure layer: TCP listener, stream adapters, config file.
pub mod infrastructure;
