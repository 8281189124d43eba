//! Placeholder VISA instrument module.
//!
//! The full implementation lives in the V2 hardware stack and is gated behind
//! the `instrument_visa` feature flag. This stub exists to satisfy build tools
//! that expect the module path to resolve when formatting without optional
//! features enabled.
