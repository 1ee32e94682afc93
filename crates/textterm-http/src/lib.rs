//! HTTP binding for the textterm protocol.
//!
//! Three endpoints relative to a base URL: a long-poll `GET` for output, a
//! JSON `POST` to (re)initialize and a plain-text `POST` for input. Every
//! request carries the session id in a header.

mod client;
mod config;

pub use client::{HttpTransport, HttpTransportError};
pub use config::{
    HttpTransportConfig, DEFAULT_DATA_PATH, DEFAULT_HANDLER_HEADER, DEFAULT_INIT_PATH,
    DEFAULT_INPUT_PATH, DEFAULT_INTERRUPT_HEADER, DEFAULT_SESSION_HEADER,
};
