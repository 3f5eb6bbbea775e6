//! Join Warden — group-join request moderation engine.
//!
//! Evaluates incoming join requests through an ordered filter chain
//! (denylist, duplicate throttle, prior-membership, auto-accept) and either
//! resolves them automatically or escalates to a human reviewer with numbered
//! commands, bulk resolution, and a timeout fallback.

pub mod approval;
pub mod config;
pub mod counter;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod notify;
pub mod rules;
pub mod transport;
