//! Data Transfer Objects for the registry API
//!
//! The registry reports the same kind of work under different envelopes
//! depending on the endpoint. DTOs decode each envelope and convert it
//! into the shared [`crate::domain::job::Job`] shape.

pub mod job;
