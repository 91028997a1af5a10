//! Incremental local backup of a remote journal.
//!
//! This crate provides the core functionality for the `jb` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Record types (entries, comments, user info)
//! - [`storage`] - On-disk JSON store with an in-memory index
//! - [`remote`] - Journal service API and its HTTP client
//! - [`sync`] - Entry and comment synchronization passes
//! - [`tree`] - Comment thread reconstruction
//! - [`index`] - Tag and month indexes over stored entries
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod tree;

pub use error::{Error, Result};
