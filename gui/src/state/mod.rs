//! Application state management
//!
//! This module contains the shared application state and related types.

mod app_state;

pub use app_state::{AppState, SharedState, TOAST_ID_COUNTER};
