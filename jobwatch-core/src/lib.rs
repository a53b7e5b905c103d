//! Jobwatch Core
//!
//! Core types for monitoring registry background jobs.
//!
//! This crate contains:
//! - Domain types: jobs, statuses and pagination
//! - DTOs: wire shapes of the registry's job history endpoints

pub mod domain;
pub mod dto;
