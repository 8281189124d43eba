//! Mock Hardware Implementations
//!
//! Provides simulated hardware devices for testing without physical hardware.
//! All mock devices use async-safe operations (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `MockStage` - Simulated motion stage with realistic timing
//! - `MockCamera` - Simulated camera with trigger and streaming support
//! - `MockPowerMeter` - Simulated power meter with configurable readings
//!
//! # Performance Characteristics
//!
//! - MockStage: 10mm/sec motion speed, 50ms settling time
//! - MockCamera: 33ms frame readout (30fps simulation)
//!
//! # Note
//!
//! This module re-exports from `daq-driver-mock` crate (bd-ha9c Driver Decoupling).
//! The standalone crate provides DriverFactory-based implementations.

// Re-export all public items from daq-driver-mock
pub use daq_driver_mock::{
    generate_test_pattern, MockCamera, MockCameraFactory, MockPowerMeter, MockPowerMeterFactory,
    MockStage, MockStageFactory,
};
