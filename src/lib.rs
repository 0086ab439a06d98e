//! Keeps a local cache of polls in sync with definition and results pushes.

pub mod clock;
pub mod config;
pub mod feed;
pub mod models;
pub mod poll;
pub mod session;
pub mod tasks;
