//! Taskpad record store service library.
//!
//! Exposes the service for use in tests and embedding. The server
//! accepts WebSocket connections and answers record store requests
//! against the authoritative in-memory `tasks` table.

pub mod config;
pub mod server;
pub mod table;
