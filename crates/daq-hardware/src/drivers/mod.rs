#[cfg(feature = "driver-thorlabs")]
pub mod ell14;

#[cfg(all(test, feature = "driver-thorlabs"))]
mod ell14_polling;

#[cfg(feature = "driver-newport")]
pub mod esp300;
#[cfg(feature = "driver-spectra-physics")]
pub mod maitai;
pub mod mock;
#[cfg(feature = "serial")]
pub mod mock_serial;
#[cfg(feature = "driver-newport")]
pub mod newport_1830c;
#[cfg(feature = "driver_pvcam")]
pub use daq_driver_pvcam as pvcam;
