//! A basic skeleton for an SCPI-based instrument.
use crate::{
    config::Settings,
    core::{DataPoint, Instrument},
    error::DaqError,
};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct ScpiInstrument;

impl Default for ScpiInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl ScpiInstrument {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Instrument for ScpiInstrument {
    fn name(&self) -> String {
        "SCPI Instrument".to_string()
    }

    async fn connect(&mut self, _settings: &Arc<Settings>) -> Result<(), DaqError> {
        info!("Connecting to SCPI Instrument...");
        // TODO: Implement connection logic (e.g., open serial port)
        // let config = settings.instruments.get("scpi_keithley").unwrap();
        // let port = config.get("port").unwrap().as_str().unwrap();
        // let baud_rate = config.get("baud_rate").unwrap().as_integer().unwrap() as u32;
        // let port = serialport::new(port, baud_rate).open()...
        info!("SCPI connection is a placeholder.");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DaqError> {
        info!("Disconnecting from SCPI Instrument.");
        Ok(())
    }

    async fn data_stream(&mut self) -> Result<broadcast::Receiver<DataPoint>, DaqError> {
        // This is a placeholder. A real implementation would spawn a task
        // that repeatedly queries the instrument and sends data points.
        let (sender, receiver) = broadcast::channel(1);
        let _ = sender.send(DataPoint {
            timestamp: chrono::Utc::now(),
            channel: "scpi_placeholder".to_string(),
            value: 0.0,
            unit: "N/A".to_string(),
            metadata: None,
        });
        Ok(receiver)
    }
}
