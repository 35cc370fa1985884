//! Core, runtime-agnostic building blocks of the bookmux client stack.
//!
//! This crate owns everything that does not touch a socket: the wire
//! envelopes, the [`rpc::RequestCorrelator`] that matches responses to
//! waiters, the tag and bookmark data model, and the optimistic-update
//! protocol used by interactive tag tree editing. Transports live in the
//! `extensions/` crates; rendering is left to a host reached through
//! [`host::HostSurface`].

pub mod constants;
pub mod host;
pub mod model;
pub mod optimistic;
pub mod rpc;
pub mod utils;
