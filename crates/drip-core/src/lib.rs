//! Core types, scheduling logic, and the store trait for Drip.
//!
//! Scheduling is split into three stages: a deterministic per-contact send
//! offset ([`offset`]), placement of a local send time into a campaign's
//! business window with DST-correct conversion ([`window`]), and the due
//! decision itself ([`evaluator`]). This crate is free of HTTP and database
//! dependencies; backends implement [`store::CampaignStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod automation;
pub mod campaign;
pub mod contact;
pub mod error;
pub mod evaluator;
pub mod location;
pub mod offset;
pub mod schedule;
pub mod store;
pub mod window;

pub use error::{Error, Result};
