#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]

//! Session-oriented HTTP API for foreground command execution and
//! background process supervision, exposed to AI agents over plain JSON.

pub mod config;
pub mod executor;
pub mod history;
pub mod routes;
pub mod session;
pub mod shell;
pub mod state;
pub mod supervisor;

pub use state::AppState;
