//! Reactive to-do list sync: a store-backed task collection, a per-user
//! live query that keeps a list display up to date, and the CLI and TUI
//! built on top of them.

pub mod auth;
pub mod binder;
pub mod commands;
pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod repository;
pub mod store;
pub mod tui;
pub mod viewmodel;
