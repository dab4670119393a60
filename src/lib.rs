//! Client SDK for the Diatheke dialog management server.
//!
//! A [`Connection`] owns the gRPC channel. Sessions created from it scope the
//! event, audio input and audio reply streams; [`coordinator::SessionManager`]
//! runs all three for a voice dialog.

pub mod audio;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod proto;
pub mod rpc;
pub mod streams;

pub use client::{ConnectOptions, Connection, SecurityOptions, Session, connect};
pub use error::{Error, Result};
pub use rpc::CallOptions;
pub use streams::event::{CommandEvent, CommandStatus, Event, EventHandler, StatusCode};
