//! glimpse: web-accessible remote desktop server.
//!
//! One process captures the host display, JPEG-encodes frames, and streams
//! them to browser clients over WebSocket, applying authorized mouse and
//! keyboard input back onto the host. Two shared secrets select the session
//! role: control or view-only.

pub mod cli;
pub mod config;
pub mod input;
pub mod protocol;
pub mod screen;
pub mod server;
