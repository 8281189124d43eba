pub mod driver;
pub mod factory;

#[cfg(feature = "scripting")]
pub mod script_engine;

pub use driver::GenericSerialDriver;
pub use factory::{GenericSerialDriverFactory, GenericSerialInstanceConfig, load_all_factories};