#![doc = "sharepoint-scrape: pull SharePoint site pages and drive files into a local directory."]

//! The crate is layered leaf-first:
//!
//! - [`auth`]: client-credentials token acquisition and caching
//! - [`graph`]: authorized Graph calls with retry and pagination
//! - [`pages`]: site page listing and text extraction
//! - [`drive`]: breadth-first drive traversal
//! - [`download`]: extension filter and atomic file download
//! - [`synchronise`]: the orchestrator composing the above per run mode
//!
//! Network access and HTML extraction sit behind the traits in [`contract`].

pub mod auth;
pub mod cli;
pub mod config;
pub mod contract;
pub mod download;
pub mod drive;
pub mod error;
pub mod graph;
pub mod html_text;
pub mod http;
pub mod load_config;
pub mod models;
pub mod pages;
pub mod sink;
pub mod synchronise;

pub use synchronise::{synchronise, Mode, Orchestrator, RunState, RunSummary};
