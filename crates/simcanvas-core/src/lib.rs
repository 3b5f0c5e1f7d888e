//! Core types, config, errors, and the layout preference store for simcanvas.

pub mod config;
pub mod error;
pub mod layout;
pub mod observe;
pub mod simulation;
pub mod types;
