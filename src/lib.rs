//! Protocol and display core of a TN3270/TN3270E terminal emulator.
//!
//! This crate covers the Telnet/TN3270E negotiation state machine, the
//! inbound 3270 data-stream parser, the 1920-cell screen model with field
//! attributes and MDT tracking, and the outbound AID-response builder. It
//! exposes a byte-in / byte-out and event surface; a GUI, keyboard dispatch
//! widget, or command-line front end is a consumer, not part of this crate.

pub mod address;
pub mod codes;
pub mod connection;
pub mod ebcdic;
pub mod error;
pub mod event;
pub mod screen;
pub mod stream;
pub mod telnet;

pub use connection::{Connection, ConnectionState};
pub use error::{ConnectError, Error, Result};
pub use event::Event;
pub use screen::Screen;
