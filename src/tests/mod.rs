//! Connection and session behaviour against a scripted in-memory server.
//!
//! All async tests run with paused time, so heartbeat and backoff timers fire
//! deterministically as soon as every task is idle.

mod connection_tests;
mod mock;
