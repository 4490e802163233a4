//! ChoirOS Trace Debugger - execution trace reconstruction for agent runs
//!
//! This crate turns the flat envelope stream of an agent execution into a
//! per-run span tree with stage, tool and model-call timings, and resolves
//! request/response detail for model calls from the structured log store.

pub mod actors;
pub mod config;
pub mod detail;
pub mod log_store;
pub mod replay;
pub mod trace;

pub use trace::build_trace;
