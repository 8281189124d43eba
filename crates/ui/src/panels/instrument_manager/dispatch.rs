//! Panel dispatch logic for device-to-control-panel mapping.
//!
//! This module provides a centralized function to determine which control panel
//! type should be used for a given device based on its capabilities.
//!
//! Note: Currently unused - panel selection is inline in `render_device_control_panel`.
//! This module is retained for future refactoring to centralize panel dispatch logic.

#![allow(dead_code)]

use protocol::daq::DeviceInfo;

/// The type of control panel to use for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelType {
    /// MaiTai Ti:Sapphire laser control panel (wavelength, emission, shutter)
    MaiTai,
    /// Power meter control panel (readable sensors)
    PowerMeter,
    /// Rotator control panel (ELL14-style rotation mounts)
    Rotator,
    /// Stage control panel (linear/XY stages)
    Stage,
    /// Comedi DAQ unified control panel (AI, AO, DIO, counters)
    Comedi,
}

/// Determine the appropriate control panel type for a device.
///
/// Priority order:
/// 1. Comedi DAQ devices (comedi_analog_input, comedi_analog_output, ni_daq) → Comedi
/// 2. Laser capabilities (emission/shutter/wavelength) → MaiTai
/// 3. Readable without motion (sensors, meters) → PowerMeter
/// 4. Movable with "ell14" in driver name → Rotator
/// 5. Movable → Stage (default for motion devices)
///
/// # Arguments
/// * `device` - Device info with capability flags
///
/// # Returns
/// The `PanelType` to use for this device's control panel
pub fn determine_panel_type(device: &DeviceInfo) -> PanelType {
    let driver_lower = device.driver_type.to_lowercase();

    // Priority 1: Comedi DAQ devices
    if driver_lower.contains("comedi")
        || driver_lower.contains("ni_daq")
        || driver_lower.contains("nidaq")
        || driver_lower.contains("pci-mio")
        || driver_lower.contains("pcimio")
    {
        return PanelType::Comedi;
    }

    // Priority 2: Laser controls (MaiTai-style devices)
    if device.is_emission_controllable
        || device.is_shutter_controllable
        || device.is_wavelength_tunable
    {
        return PanelType::MaiTai;
    }

    // Priority 3: Pure readable devices (power meters, sensors)
    if device.is_readable && !device.is_movable {
        return PanelType::PowerMeter;
    }

    // Priority 4: Movable devices - distinguish rotator vs stage
    if device.is_movable {
        if driver_lower.contains("ell14") || driver_lower.contains("rotator") {
            return PanelType::Rotator;
        }
        return PanelType::Stage;
    }

    // Default fallback: Stage panel (most generic)
    PanelType::Stage
}
