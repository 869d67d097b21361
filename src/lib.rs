//! ADA - camera-based voice and vision assistant
//!
//! This library provides the core functionality for ADA:
//! - Wake detection (timer or spoken phrase)
//! - Face identification and enrollment against a local face registry
//! - Spoken questions answered by a vision model looking at the camera
//! - A per-frame session state machine that never blocks on I/O
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Frame loop (app)                     │
//! │   Capture source  →  SessionMachine  →  Display      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ task slots
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Collaborators                        │
//! │   Wake  │  Identity  │  Listener  │  Vision  │  TTS  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   SQLite face registry  │  Face service  │  OpenAI   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod identity;
pub mod session;
pub mod task;
pub mod vision;
pub mod voice;

pub use app::App;
pub use config::{Config, SessionTimings};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
