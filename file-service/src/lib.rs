#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]

//! Session-oriented HTTP API for file/directory CRUD, a textual diff/patch
//! engine, and project-context extraction, exposed to AI agents over plain
//! JSON.

pub mod config;
pub mod context;
pub mod diff;
pub mod operations;
pub mod routes;
pub mod session;
pub mod state;

pub use state::AppState;
