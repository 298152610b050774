//! quantfolio-planner: command-line portfolio planner on top of quantfolio.
//!
//! Reads daily returns (and optional fundamentals) from JSON files, runs
//! selection, weighting, analysis, projection and simulation for a request,
//! and keeps a JSONL journal of every run.

pub mod config;
pub mod data;
pub mod error;
pub mod journal;
pub mod report;
pub mod run;
