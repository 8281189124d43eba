//! Integration test suite modules
//!
//! This module organizes integration tests into categories for
//! multi-instrument scenarios, session persistence, command handling,
//! and data flow validation.

mod command_flood_test;
mod data_flow_test;
mod multi_instrument_test;
mod session_roundtrip_test;
