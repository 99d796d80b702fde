//! CLI library components for selfup.

pub mod cli;
pub mod commands;
pub mod logging;
