// DESIGN REFERENCE: Test cases for TimeoutSettings validation
// These tests should be added to src/config.rs when implementing bd-ltd3
