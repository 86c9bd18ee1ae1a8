//! Postflight Adapters - concrete probe implementations
//!
//! Platform probes live behind the `ProbeAdapter` trait so the engine
//! never branches on platform. This crate ships the two builtin ones:
//! - `HttpHealthProbe`: probes HTTP health endpoints on a live target
//! - `FixtureProbe`: replays recorded observations from a JSON file

pub mod fixture;
pub mod http;

pub use fixture::{FixtureError, FixtureProbe};
pub use http::HttpHealthProbe;
