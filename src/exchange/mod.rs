// src/exchange/mod.rs
pub mod client;
pub mod paper;
pub mod session;

pub use client::{ConnectionState, Connector, OptionQuery, PointQuery};
pub use paper::PaperConnector;
pub use session::{MemorySessionStore, SessionStore};
