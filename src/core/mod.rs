//! Core application module
//!
//! This module contains:
//! - Orchestration of capture, OCR and chat actions (app.rs)
//! - The tagged console the actions report to (console.rs)

pub mod app;
pub mod console;
