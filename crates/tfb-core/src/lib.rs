//! Core logic for the TF System membership bot.
//!
//! This crate is intentionally chat-platform agnostic. The rank authority is
//! pure; the API client talks HTTP through the [`api::transport::Transport`]
//! port; chat adapters call in through [`commands::handle_line`].

pub mod api;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod rank;

pub use errors::{Error, Result};
