//! Core of the ticket-triage agent tooling.
//!
//! - [`remote`]: the agents service seam and its REST client
//! - [`run`]: polling one run to a terminal outcome with rate-limit retry
//! - [`transcript`]: thread messages as display lines
//! - [`harness`]: running a ticket through a roster of agents
//! - [`provision`]: creating the agent fleet
//! - [`dns`]: waiting for a new endpoint's host name to resolve

pub mod dns;
pub mod harness;
pub mod provision;
pub mod remote;
pub mod run;
pub mod transcript;
