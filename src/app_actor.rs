//! Actor-based DAQ application state management.
//!
//! This module implements the actor pattern for centralized state management,
//! replacing the previous `Arc<Mutex<DaqAppInner>>` approach. The actor model
//! eliminates lock contention, prevents deadlocks, and provides a clearer
//! mental model for concurrent state management.
//!
//! # Architecture
//!
//! The [`DaqManagerActor`] is the single owner of all DAQ state and runs in
//! a dedicated Tokio task. It processes [`DaqCommand`] messages received via
//! an mpsc channel and responds using oneshot channels.
//!
//! ## Actor Responsibilities
//!
//! - **Lifecycle Management**: Spawns, monitors, and shuts down instrument and storage tasks
//! - **State Ownership**: Sole owner of instruments, metadata, and configuration
//! - **Command Processing**: Handles all state-mutating operations sequentially
//! - **Task Supervision**: Manages graceful shutdown with timeouts and fallback abort
//!
//! ## Message Flow
//!
//! 1. GUI sends `DaqCommand` via mpsc channel (non-blocking)
//! 2. Actor processes command in its event loop (sequential, no locks)
//! 3. Actor performs state mutation (e.g., spawn instrument, start recording)
//! 4. Actor sends response via oneshot channel
//! 5. GUI receives result asynchronously
//!
//! ## Data Flow
//!
//! Instrument tasks broadcast data through a shared [`DataDistributor`]:
//!
//! ```text
//! Instrument Task 1 ──┐
//! Instrument Task 2 ──┼──> DataDistributor ──┬──> GUI (plotting)
//! Instrument Task N ──┘    (broadcast)       └──> Storage Writer
//! ```
//!
//! ## Graceful Shutdown Protocol
//!
//! 1. Actor receives `DaqCommand::Shutdown`
//! 2. Stops storage writer (5s timeout)
//! 3. Sends `InstrumentCommand::Shutdown` to each instrument
//! 4. Waits up to 5s per instrument for graceful disconnect
//! 5. Aborts any stragglers that exceed timeout
//! 6. Actor event loop exits
//!
//! # Example
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use rust_daq::{app_actor::DaqManagerActor, messages::DaqCommand};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Create command channel
//! let (cmd_tx, cmd_rx) = mpsc::channel(32);
//!
//! // Spawn actor task
//! # let settings = rust_daq::config::Settings::default();
//! # let instrument_registry = std::sync::Arc::new(rust_daq::instrument::InstrumentRegistry::new());
//! # let processor_registry = std::sync::Arc::new(rust_daq::data::registry::ProcessorRegistry::new());
//! # let runtime = std::sync::Arc::new(tokio::runtime::Runtime::new()?);
//! let actor = DaqManagerActor::new(
//!     settings,
//!     instrument_registry,
//!     processor_registry,
//!     runtime,
//! )?;
//! tokio::spawn(actor.run(cmd_rx));
//!
//! // Send command from GUI
//! let (cmd, rx) = DaqCommand::spawn_instrument("my_instrument".to_string());
//! cmd_tx.send(cmd).await?;
//! let result = rx.await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    config::{dependencies::DependencyGraph, versioning::VersionManager, Settings},
    core::{InstrumentHandle, MeasurementProcessor},
    data::registry::ProcessorRegistry,
    instrument::{
        mock_v3::{MockCameraV3, MockPowerMeterV3},
        InstrumentRegistry,
    },
    instrument_manager_v3::InstrumentManagerV3,
    instruments_v2::Newport1830CV3,
    measurement::{DataDistributor, DataDistributorConfig, Measure, SubscriberMetricsSnapshot},
    messages::{DaqCommand, SpawnError},
    metadata::Metadata,
    modules::{Module, ModuleConfig, ModuleInstrumentAssignment},
    session::{self, Session},
};
use anyhow::{anyhow, Context, Result};
use daq_core::{timestamp, Measurement};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::{collections::HashMap, time::Duration};
use tokio::{
    runtime::Runtime,
    sync::{mpsc, Mutex},
    task::{JoinHandle, JoinSet},
};

/// Central actor that owns and manages all DAQ state.
///
/// The `DaqManagerActor` runs in a dedicated Tokio task and processes
/// [`DaqCommand`] messages sequentially.
/// This design eliminates the need for `Arc<Mutex<>>` and provides
/// a clear, deadlock-free concurrency model.
///
/// # State Ownership
///
/// The actor owns:
/// - Active instrument tasks (`instruments` HashMap)
/// - Storage writer task (if recording)
/// - Application configuration (`settings`)
/// - Metadata for recordings
/// - Data distribution hub (`data_distributor`)
///
/// # Thread Safety
///
/// All state mutations occur sequentially within the actor's event loop,
/// ensuring sequential consistency without locks. External components
/// interact only via message-passing.
///
/// # Graceful Shutdown
///
/// The actor implements a supervised shutdown protocol:
/// - Stops storage writer with 5s timeout
/// - Stops each instrument with 5s timeout per instrument
/// - Aborts any tasks that don't respond in time
/// - Ensures all resources are properly released
pub struct DaqManagerActor<M>
where
    M: Measure + 'static,
    M::Data: Into<daq_core::Measurement>,
{
    settings: Settings,
    instrument_registry: Arc<InstrumentRegistry<M>>,
    instrument_registry_v2: Arc<crate::instrument::InstrumentRegistryV2>,
    processor_registry: Arc<ProcessorRegistry>,
    module_registry: Arc<crate::modules::ModuleRegistry<M>>,
    pub instruments: HashMap<String, InstrumentHandle>,
    /// JoinSet for monitoring instrument task lifecycle (bd-6ae0)
    /// Allows detection of crashed/completed tasks for automatic cleanup
    instrument_tasks: JoinSet<(String, Result<()>)>,
    modules: HashMap<String, Arc<Mutex<Box<dyn Module>>>>,
    pub dependency_graph: DependencyGraph,
    data_distributor: Arc<DataDistributor<Arc<Measurement>>>,
    metadata: Metadata,
    writer_task: Option<JoinHandle<Result<()>>>,
    writer_shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    storage_format: String,
    runtime: Arc<Runtime>,
    shutdown_flag: bool,
    version_manager: VersionManager,

    /// V3 instrument manager (Phase 3)
    instrument_manager_v3: Option<Arc<Mutex<InstrumentManagerV3>>>,
}

impl<M> DaqManagerActor<M>
where
    M: Measure + 'static,
    M::Data: Into<daq_core::Measurement>,
{
    /// Creates a new `DaqManagerActor` with the given configuration.
    ///
    /// This does not start the actor's event loop. Call [`run`](Self::run)
    /// and spawn it as a Tokio task.
    ///
    /// # Arguments
    ///
    /// - `settings`: Application configuration (instruments, storage, etc.)
    /// - `instrument_registry`: Factory for creating instrument instances
    /// - `processor_registry`: Factory for creating data processors
    /// - `runtime`: Tokio runtime handle for spawning instrument tasks
    pub fn new(
        settings: Settings,
        instrument_registry: Arc<InstrumentRegistry<M>>,
        instrument_registry_v2: Arc<crate::instrument::InstrumentRegistryV2>,
        processor_registry: Arc<ProcessorRegistry>,
        module_registry: Arc<crate::modules::ModuleRegistry<M>>,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let distributor_cfg = &settings.application.data_distributor;
        let distributor_config = DataDistributorConfig::with_thresholds(
            distributor_cfg.subscriber_capacity,
            distributor_cfg.warn_drop_rate_percent,
            distributor_cfg.error_saturation_percent,
            Duration::from_secs(distributor_cfg.metrics_window_secs.max(1)),
        );
        let data_distributor = Arc::new(DataDistributor::with_config(distributor_config));
        let storage_format = settings.storage.default_format.clone();

        std::fs::create_dir_all(".daq/config_versions")?;
        let version_manager = VersionManager::new(".daq/config_versions".into());

        // V3 Instrument Manager Initialization (Phase 3 vertical slice)
        let mut manager_v3 = InstrumentManagerV3::new();
        manager_v3.set_data_distributor(data_distributor.clone());
        manager_v3.set_timeouts(settings.application.timeouts.clone());
        manager_v3.register_factory("MockCameraV3", MockCameraV3::from_config);
        manager_v3.register_factory("MockPowerMeterV3", MockPowerMeterV3::from_config);
        manager_v3.register_factory("Newport1830CV3", Newport1830CV3::from_config);
        let instrument_manager_v3 = Some(Arc::new(Mutex::new(manager_v3)));

        // Spawn NTP synchronization task
        tokio::spawn(async move {
            loop {
                if let Err(e) = timestamp::synchronize_ntp("pool.ntp.org").await {
                    log::warn!("NTP synchronization failed: {}", e);
                }
                // Synchronize every hour
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });

        Ok(Self {
            settings,
            instrument_registry,
            instrument_registry_v2,
            processor_registry,
            module_registry,
            instruments: HashMap::new(),
            instrument_tasks: JoinSet::new(),
            modules: HashMap::new(),
            dependency_graph: DependencyGraph::new(),
            data_distributor,
            metadata: Metadata::default(),
            writer_task: None,
            writer_shutdown_tx: None,
            storage_format,
            runtime,
            shutdown_flag: false,
            version_manager,
            instrument_manager_v3,
        })
    }

    /// Runs the actor event loop, processing commands until shutdown.
    ///
    /// This method consumes the actor and runs indefinitely until a
    /// `DaqCommand::Shutdown` is received. It should be spawned as a
    /// Tokio task:
    ///
    /// ```no_run
    /// # use tokio::sync::mpsc;
    /// # use rust_daq::{app_actor::DaqManagerActor, messages::DaqCommand};
    /// # async fn example(actor: DaqManagerActor<impl rust_daq::measurement::Measure>, cmd_rx: mpsc::Receiver<rust_daq::messages::DaqCommand>) {
    /// tokio::spawn(actor.run(cmd_rx));
    /// # }
    /// ```
    ///
    /// Commands are processed sequentially in the order received. Each
    /// command mutates actor state and sends a response via oneshot channel.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<DaqCommand>) {
        info!("DaqManagerActor started");

        // Load V3 instruments from config (Phase 3)
        if let Some(ref v3_manager) = self.instrument_manager_v3 {
            let mut manager_guard = v3_manager.lock().await;
            if let Err(e) = manager_guard
                .load_from_config(&self.settings.instruments_v3)
                .await
            {
                error!("Failed to load V3 instruments: {}", e);
            } else {
                info!("V3 instruments loaded successfully");
            }
            drop(manager_guard);
        }

        loop {
            tokio::select! {
                // Handle incoming commands
                Some(command) = command_rx.recv() => {
                    match command {
                        DaqCommand::SpawnInstrument { id, response } => {
                    let result = self.spawn_instrument(&id).await;
                    let _ = response.send(result);
                }

                DaqCommand::StopInstrument { id, response } => {
                    let _ = self.stop_instrument(&id).await;
                    let _ = response.send(());
                }

                DaqCommand::SendInstrumentCommand {
                    id,
                    command,
                    response,
                } => {
                    let result = self.send_instrument_command(&id, command).await;
                    let _ = response.send(result);
                }

                DaqCommand::StartRecording { response } => {
                    let result = self.start_recording().await;
                    let _ = response.send(result);
                }

                DaqCommand::StopRecording { response } => {
                    let _ = self.stop_recording().await;
                    let _ = response.send(());
                }

                DaqCommand::SaveSession {
                    path,
                    gui_state,
                    response,
                } => {
                    let result = self.save_session(&path, gui_state).await;
                    let _ = response.send(result);
                }

                DaqCommand::LoadSession { path, response } => {
                    let result = self.load_session(&path).await;
                    let _ = response.send(result);
                }

                DaqCommand::GetInstrumentList { response } => {
                    let list: Vec<String> = self.instruments.keys().cloned().collect();
                    let _ = response.send(list);
                }

                DaqCommand::GetAvailableChannels { response } => {
                    let channels = self.instrument_registry.list().collect();
                    let _ = response.send(channels);
                }

                DaqCommand::GetMetrics { response } => {
                    let metrics = self.distributor_metrics_snapshot().await;
                    let _ = response.send(metrics);
                }

                DaqCommand::GetStorageFormat { response } => {
                    let _ = response.send(self.storage_format.clone());
                }

                DaqCommand::SetStorageFormat { format, response } => {
                    self.storage_format = format;
                    let _ = response.send(());
                }

                DaqCommand::SubscribeToData { response } => {
                    let receiver = self.data_distributor.subscribe("dynamic_subscriber").await;
                    let _ = response.send(receiver);
                }

                DaqCommand::SpawnModule {
                    id,
                    module_type,
                    config,
                    response,
                } => {
                    let result = self.spawn_module(&id, &module_type, config);
                    let _ = response.send(result);
                }

                DaqCommand::AssignInstrumentToModule {
                    module_id,
                    role,
                    instrument_id,
                    response,
                } => {
                    let result = self
                        .assign_instrument_to_module(&module_id, &role, &instrument_id)
                        .await;
                    let _ = response.send(result);
                }
                DaqCommand::AddInstrumentDynamic {
                    id,
                    instrument_type,
                    config,
                    response,
                } => {
                    let result = self
                        .add_instrument_dynamic(&id, &instrument_type, config)
                        .await;
                    let _ = response.send(result);
                }
                DaqCommand::RemoveInstrumentDynamic {
                    id,
                    force,
                    response,
                } => {
                    let result = self.remove_instrument_dynamic(&id, force).await;
                    let _ = response.send(result);
                }
                DaqCommand::UpdateInstrumentParameter {
                    id,
                    parameter,
                    value,
                    response,
                } => {
                    let result = self
                        .update_instrument_parameter(&id, &parameter, &value)
                        .await;
                    let _ = response.send(result);
                }
                DaqCommand::StartModule { id, response } => {
                    let result = self.start_module(&id).await;
                    let _ = response.send(result);
                }

                DaqCommand::StopModule { id, response } => {
                    let result = self.stop_module(&id).await;
                    let _ = response.send(result);
                }

                DaqCommand::CreateConfigSnapshot { label, response } => {
                    let result = self
                        .version_manager
                        .create_snapshot(&self.settings, label)
                        .await;
                    let _ = response.send(result);
                }
                DaqCommand::ListConfigVersions { response } => {
                    let result = self.version_manager.list_versions().await;
                    let _ = response.send(result);
                }
                DaqCommand::RollbackToVersion {
                    version_id,
                    response,
                } => match self.version_manager.rollback(&version_id).await {
                    Ok(settings) => {
                        self.settings = settings;
                        let _ = response.send(Ok(()));
                    }
                    Err(e) => {
                        error!("Failed to rollback to version '{}': {}", version_id.0, e);
                        let _ = response.send(Err(e));
                    }
                },
                DaqCommand::CompareConfigVersions {
                    version_a,
                    version_b,
                    response,
                } => {
                    let result = self
                        .version_manager
                        .diff_versions(&version_a, &version_b)
                        .await;
                    let _ = response.send(result);
                }
                DaqCommand::GetInstrumentDependencies { id, response } => {
                    let deps = self.dependency_graph.get_dependents(&id);
                    let _ = response.send(deps);
                }

                        DaqCommand::Shutdown { response } => {
                            info!("Shutdown command received");
                            let result = self.shutdown().await;
                            let _ = response.send(result);
                            break; // Exit event loop
                        }
                    }
                }

                // Monitor instrument task completion/crashes (bd-6ae0)
                Some(result) = self.instrument_tasks.join_next() => {
                    match result {
                        Ok((instrument_id, task_result)) => {
                            match task_result {
                                Ok(_) => info!("Instrument '{}' task completed gracefully.", instrument_id),
                                Err(e) => error!("Instrument '{}' task failed: {}", instrument_id, e),
                            }
                            // Always remove the handle on task completion
                            if self.instruments.remove(&instrument_id).is_some() {
                                info!("Cleaned up handle for instrument '{}'.", instrument_id);
                            }
                        }
                        Err(join_error) => {
                            if join_error.is_panic() {
                                // Extracting the instrument ID from a panic is tricky.
                                // This part of the bug is non-trivial to solve without major changes.
                                // For now, we log that a task panicked.
                                error!("An instrument task panicked: {:?}. Stale handle may remain.", join_error);
                            } else {
                                error!("Failed to join instrument task: {}", join_error);
                            }
                        }
                    }
                }

                // Handle channel closed (no more commands)
                else => {
                    info!("Command channel closed, shutting down actor");
                    break;
                }
            }
        }

        info!("DaqManagerActor shutting down");
    }

    /// Spawns an instrument task on the Tokio runtime.
    ///
    /// This method:
    /// 1. Validates instrument configuration from settings
    /// 2. Creates instrument instance from registry
    /// 3. Builds processor chain for this instrument
    /// 4. Connects to the instrument (synchronously blocks)
    /// 5. Spawns a Tokio task with `tokio::select!` event loop
    ///
    /// The spawned task handles:
    /// - Receiving data from instrument's async stream
    /// - Processing data through measurement processor chain
    /// - Broadcasting processed measurements via `DataDistributor`
    /// - Receiving commands via mpsc channel
    /// - Graceful shutdown on `InstrumentCommand::Shutdown`
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if:
    /// - Instrument is already running
    /// - Configuration is invalid or missing
    /// - Instrument type not registered
    /// - Connection to hardware fails
    /// - Processor creation fails
    async fn spawn_instrument(&mut self, id: &str) -> Result<(), SpawnError> {
        if self.instruments.contains_key(id) {
            return Err(SpawnError::AlreadyRunning(format!(
                "Instrument '{}' is already running",
                id
            )));
        }

        let instrument_config = self.settings.instruments.get(id).ok_or_else(|| {
            SpawnError::InvalidConfig(format!("Instrument config for '{}' not found", id))
        })?;
        let instrument_type = instrument_config
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SpawnError::InvalidConfig(format!(
                    "Instrument type for '{}' not found in config",
                    id
                ))
            })?;

        // Try V2 registry first (preferred for native V2 instruments)
        if let Some(v2_instrument) = self.instrument_registry_v2.create(instrument_type, id) {
            info!(
                "Spawning V2 instrument '{}' of type '{}'",
                id, instrument_type
            );
            return self.spawn_v2_instrument(id, v2_instrument).await;
        }

        // Fallback to V1 registry (legacy instruments)
        info!(
            "Spawning V1 instrument '{}' of type '{}'",
            id, instrument_type
        );
        let mut instrument = self
            .instrument_registry
            .create(instrument_type, id)
            .ok_or_else(|| {
                SpawnError::InvalidConfig(format!(
                    "Instrument type '{}' not registered in either V1 or V2 registry",
                    instrument_type
                ))
            })?;

        // Set V2 data distributor for all instruments
        // V2InstrumentAdapter will use it; V1 instruments ignore it (no-op)
        instrument.set_v2_data_distributor(self.data_distributor.clone());

        // Create processor chain for this instrument
        let mut processors: Vec<Box<dyn MeasurementProcessor>> = Vec::new();
        if let Some(processor_configs) = self.settings.processors.as_ref().and_then(|p| p.get(id)) {
            for config in processor_configs {
                let processor = self
                    .processor_registry
                    .create(&config.r#type, &config.config)
                    .map_err(|e| {
                        SpawnError::InvalidConfig(format!(
                            "Failed to create processor '{}' for instrument '{}': {}",
                            config.r#type, id, e
                        ))
                    })?;
                processors.push(processor);
            }
        }

        let data_distributor = self.data_distributor.clone();
        let settings = Arc::new(self.settings.clone());
        let id_clone = id.to_string();

        // Create command channel
        let (command_tx, mut command_rx) =
            tokio::sync::mpsc::channel(settings.application.command_channel_capacity);

        // Try to connect asynchronously
        instrument
            .connect(&id_clone, &settings)
            .await
            .map_err(|e| {
                SpawnError::ConnectionFailed(format!(
                    "Failed to connect to instrument '{}': {}",
                    id_clone, e
                ))
            })?;
        info!("Instrument '{}' connected.", id_clone);

        let capabilities = instrument.capabilities();

        let abort_handle = self.instrument_tasks.spawn(async move {
            let task_logic = async {
                let mut stream = instrument
                    .measure()
                    .data_stream()
                    .await
                    .context("Failed to get data stream")?;
                loop {
                    tokio::select! {
                        data_point_option = stream.recv() => {
                            match data_point_option {
                                Some(dp) => {
                                    // Extract data from Arc and convert M::Data to daq_core::Measurement using Into trait
                                    // Preserve instrument identity by embedding it into the channel name
                                    let mut measurement: daq_core::Measurement = (*dp).clone().into();
                                    if let daq_core::Measurement::Scalar(ref mut scalar) = measurement {
                                        scalar.channel = format!("{}:{}", id_clone, scalar.channel);
                                    }
                                    let mut measurements = vec![Arc::new(measurement)];

                                    // Process through measurement processor chain
                                    for processor in &mut processors {
                                        measurements = processor.process_measurements(&measurements);
                                    }

                                    // Broadcast processed measurements
                                    for measurement in measurements {
                                        if let Err(e) = data_distributor.broadcast(measurement).await {
                                            error!("Failed to broadcast measurement: {}", e);
                                        }
                                    }
                                }
                                None => {
                                    error!("Stream closed");
                                    break;
                                }
                            }
                        }
                        Some(command) = command_rx.recv() => {
                            match command {
                                crate::core::InstrumentCommand::Shutdown => {
                                    info!("Instrument '{}' received shutdown command", id_clone);
                                    break;
                                }
                                _ => {
                                    if let Err(e) = instrument.handle_command(command).await {
                                        error!("Failed to handle command for '{}': {}", id_clone, e);
                                    }
                                }
                            }
                        }
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {
                            log::trace!("Instrument stream for {} is idle.", id_clone);
                        }
                    }
                }

                // Graceful cleanup after loop breaks
                info!("Instrument '{}' disconnecting...", id_clone);
                instrument
                    .disconnect()
                    .await
                    .context("Failed to disconnect instrument")?;
                info!("Instrument '{}' disconnected successfully", id_clone);
                Ok(())
            };

            (id_clone, task_logic.await)
        });

        let handle = InstrumentHandle {
            abort_handle,
            command_tx,
            capabilities,
        };
        self.instruments.insert(id.to_string(), handle);
        Ok(())
    }

    /// Spawns a V2 instrument task on the Tokio runtime.
    ///
    /// This method handles V2 instruments that implement `daq_core::Instrument` directly.
    /// V2 instruments produce `Arc<Measurement>` natively and don't require conversion.
    ///
    /// # V2 Data Flow
    ///
    /// ```text
    /// V2 Instrument → measurement_stream() → broadcast::Receiver<Arc<Measurement>>
    ///               → DataDistributor → GUI/Storage
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if:
    /// - Instrument is already running
    /// - Instrument initialization fails
    /// - Measurement stream cannot be obtained
    async fn spawn_v2_instrument(
        &mut self,
        id: &str,
        mut instrument: std::pin::Pin<
            Box<dyn daq_core::Instrument + Send + Sync + 'static + Unpin>,
        >,
    ) -> Result<(), SpawnError> {
        if self.instruments.contains_key(id) {
            return Err(SpawnError::AlreadyRunning(format!(
                "Instrument '{}' is already running",
                id
            )));
        }

        // Initialize the V2 instrument safely (requires Instrument: Unpin)
        instrument
            .as_mut()
            .get_mut()
            .initialize()
            .await
            .map_err(|e| {
                SpawnError::ConnectionFailed(format!(
                    "Failed to initialize V2 instrument '{}': {}",
                    id, e
                ))
            })?;
        info!("V2 instrument '{}' initialized", id);

        // Get measurement stream from instrument
        let measurement_rx = instrument.as_ref().get_ref().measurement_stream();
        let data_distributor = self.data_distributor.clone();
        let id_clone = id.to_string();

        // Create command channel - V2 uses daq_core::InstrumentCommand internally
        // but InstrumentHandle expects core::InstrumentCommand for compatibility
        let (command_tx, mut command_rx) =
            tokio::sync::mpsc::channel(self.settings.application.command_channel_capacity);

        // V2 instruments don't expose capabilities yet (Phase 3)
        // Use empty Vec for now to maintain InstrumentHandle compatibility
        let capabilities = Vec::new();

        // Spawn task to handle V2 instrument lifecycle
        let mut instrument_handle = instrument;
        let mut measurement_rx = measurement_rx;

        let abort_handle = self.instrument_tasks.spawn(async move {
            let task_logic = async {
                loop {
                    tokio::select! {
                        measurement_result = measurement_rx.recv() => {
                            match measurement_result {
                                Ok(measurement) => {
                                    // V2 instruments produce Arc<Measurement> directly
                                    if let Err(e) = data_distributor.broadcast(measurement).await {
                                        error!(
                                            "Failed to broadcast measurement from V2 instrument '{}': {}",
                                            id_clone, e
                                        );
                                    }
                                }
                                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                    warn!(
                                        "V2 instrument '{}' receiver lagged, dropped {} frames (bursty data)",
                                        id_clone, n
                                    );
                                    // Continue processing - Lagged is recoverable
                                    continue;
                                }
                                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                    error!(
                                        "V2 instrument '{}' measurement stream closed",
                                        id_clone
                                    );
                                    break;
                                }
                            }
                        }
                        Some(command) = command_rx.recv() => {
                            // Convert core::InstrumentCommand (V1) to daq_core::InstrumentCommand (V2)
                            let v2_command = match command {
                                crate::core::InstrumentCommand::Shutdown => daq_core::InstrumentCommand::Shutdown,
                                crate::core::InstrumentCommand::SetParameter(name, value) => {
                                    // Convert ParameterValue to serde_json::Value
                                    let json_value = match value {
                                        crate::core::ParameterValue::Float(f) => serde_json::Value::from(f),
                                        crate::core::ParameterValue::Int(i) => serde_json::Value::from(i),
                                        crate::core::ParameterValue::String(s) => serde_json::Value::from(s),
                                        crate::core::ParameterValue::Bool(b) => serde_json::Value::from(b),
                                        crate::core::ParameterValue::FloatArray(arr) => serde_json::Value::from(arr),
                                        crate::core::ParameterValue::IntArray(arr) => serde_json::Value::from(arr),
                                        crate::core::ParameterValue::Null => serde_json::Value::Null,
                                        crate::core::ParameterValue::Array(arr) => {
                                            // Recursively convert array elements
                                            serde_json::Value::Array(
                                                arr.into_iter()
                                                    .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
                                                    .collect()
                                            )
                                        }
                                        crate::core::ParameterValue::Object(map) => {
                                            // Convert HashMap to JSON object
                                            serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
                                        }
                                    };
                                    daq_core::InstrumentCommand::SetParameter { name, value: json_value }
                                }
                                crate::core::InstrumentCommand::QueryParameter(name) => {
                                    // V2 GetParameter returns result via measurement stream
                                    daq_core::InstrumentCommand::GetParameter { name }
                                }
                                crate::core::InstrumentCommand::Execute(cmd, _args) => {
                                    // V2 supports specific commands via typed enum
                                    // Map common V1 Execute commands to V2 equivalents
                                    match cmd.as_str() {
                                        "start" | "start_acquisition" => daq_core::InstrumentCommand::StartAcquisition,
                                        "stop" | "stop_acquisition" => daq_core::InstrumentCommand::StopAcquisition,
                                        "snap" | "snap_frame" => daq_core::InstrumentCommand::SnapFrame,
                                        "recover" => daq_core::InstrumentCommand::Recover,
                                        _ => {
                                            log::warn!(
                                                "Unknown Execute command '{}' for V2 instrument '{}', ignoring",
                                                cmd, id_clone
                                            );
                                            continue;
                                        }
                                    }
                                }
                                crate::core::InstrumentCommand::Capability { .. } => {
                                    // V2 doesn't support capability-based commands yet
                                    // This is a Phase 3 concern
                                    log::warn!(
                                        "Capability commands not yet supported for V2 instrument '{}'",
                                        id_clone
                                    );
                                    continue;
                                }
                            };

                            match v2_command {
                                daq_core::InstrumentCommand::Shutdown => {
                                    info!("V2 instrument '{}' received shutdown command", id_clone);
                                    break;
                                }
                                _ => {
                                    // Use Pin::get_unchecked_mut() to get mutable reference
                                    // SAFETY: We own the Pin<Box<>> and the instrument won't be moved
                                    if let Err(e) = instrument_handle.as_mut().get_mut().handle_command(v2_command).await {
                                        error!(
                                            "Failed to handle command for V2 instrument '{}': {}",
                                            id_clone, e
                                        );
                                    }
                                }
                            }
                        }
                    }
                }

                // Graceful shutdown
                info!("Shutting down V2 instrument '{}'", id_clone);
                if let Err(e) = instrument_handle.as_mut().get_mut().shutdown().await {
                    error!("Error during V2 instrument '{}' shutdown: {}", id_clone, e);
                }
                info!("V2 instrument '{}' disconnected successfully", id_clone);
                Ok(())
            };
            (id_clone, task_logic.await)
        });

        let handle = InstrumentHandle {
            abort_handle,
            command_tx,
            capabilities,
        };
        self.instruments.insert(id.to_string(), handle);

        info!("V2 instrument '{}' spawned successfully", id);
        Ok(())
    }

    /// Stops a running instrument with graceful shutdown protocol.
    ///
    /// Shutdown sequence:
    /// 1. Send `InstrumentCommand::Shutdown` via command channel
    /// 2. Wait up to 5 seconds for task to complete
    /// 3. If timeout, abort task forcefully
    ///
    /// The instrument task will:
    /// - Receive shutdown command in its `tokio::select!` loop
    /// - Break out of event loop
    /// - Call `instrument.disconnect()` for cleanup
    /// - Exit gracefully
    ///
    /// If the command channel is closed or full, the task is aborted immediately.
    async fn stop_instrument(&mut self, id: &str) -> Result<(), crate::error::DaqError> {
        if let Some(handle) = self.instruments.get(id) {
            // Try graceful shutdown first
            info!("Sending shutdown command to instrument '{}'", id);
            if let Err(e) = handle
                .command_tx
                .try_send(crate::core::InstrumentCommand::Shutdown)
            {
                let error_msg = format!(
                    "Failed to send shutdown command to '{}': {}. Aborting task.",
                    id, e
                );
                log::warn!("{}", error_msg);
                handle.abort_handle.abort();
                // We still remove the handle, allowing a respawn
            }
            // The JoinSet in the main loop will handle cleanup.
            // We can remove the handle from our map immediately.
            self.instruments.remove(id);
        }
        Ok(())
    }

    /// Sends a command to a running instrument task.
    ///
    /// Commands are sent via the instrument's mpsc channel. This method
    /// implements retry logic to handle transient channel congestion:
    /// - Retries up to 10 times with 100ms delays
    /// - Total retry window: 1 second
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Instrument is not running
    /// - Channel is full after all retries (instrument is overloaded)
    /// - Channel is closed (instrument task terminated unexpectedly)
    async fn send_instrument_command(
        &self,
        id: &str,
        command: crate::core::InstrumentCommand,
    ) -> Result<()> {
        let handle = self
            .instruments
            .get(id)
            .ok_or_else(|| anyhow!("Instrument '{}' is not running", id))?;

        // Retry with brief delays instead of failing immediately
        const MAX_RETRIES: u32 = 10;
        const RETRY_DELAY_MS: u64 = 100;

        for attempt in 0..MAX_RETRIES {
            match handle.command_tx.try_send(command.clone()) {
                Ok(()) => return Ok(()),
                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                    if attempt < MAX_RETRIES - 1 {
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                        continue;
                    }
                    return Err(anyhow!(
                        "Command channel full for instrument '{}' after {} retries ({}ms total)",
                        id,
                        MAX_RETRIES,
                        MAX_RETRIES as u64 * RETRY_DELAY_MS
                    ));
                }
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                    return Err(anyhow!(
                        "Instrument '{}' is no longer running (channel closed)",
                        id
                    ));
                }
            }
        }

        unreachable!("Retry loop should return in all cases")
    }

    /// Spawns a new module instance.
    ///
    /// This method:
    /// 1. Creates a default module instance for the given type
    /// 2. Initializes it with the provided configuration
    /// 3. Stores it in the modules HashMap
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Module type is not registered (only built-in types are supported currently)
    /// - Initialization fails
    /// - Module already exists with the same ID
    pub fn spawn_module(
        &mut self,
        id: &str,
        module_type: &str,
        config: ModuleConfig,
    ) -> Result<()> {
        if self.modules.contains_key(id) {
            return Err(anyhow!("Module '{}' is already spawned", id));
        }

        // Create module using registry
        let mut module: Box<dyn Module> =
            self.module_registry.create(module_type, id.to_string())?;

        // Initialize module
        module.init(config)?;

        // Store module
        self.modules
            .insert(id.to_string(), Arc::new(Mutex::new(module)));
        info!("Module '{}' spawned and initialized", id);
        Ok(())
    }

    /// Assigns an instrument to a module.
    ///
    /// This method:
    /// 1. Gets the module from the modules HashMap
    /// 2. Gets the instrument from the instruments HashMap
    /// 3. Attempts to assign the instrument to the module
    ///
    /// The assignment is type-safe at compile time but uses dynamic dispatch at runtime.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Module is not found
    /// - Instrument is not found
    /// - Module does not support instrument assignment (not a ModuleWithInstrument)
    /// - Assignment is rejected (e.g., module is running, incompatible type)
    pub async fn assign_instrument_to_module(
        &mut self,
        module_id: &str,
        role: &str,
        instrument_id: &str,
    ) -> Result<()> {
        let module = self
            .modules
            .get(module_id)
            .ok_or_else(|| anyhow!("Module '{}' is not spawned", module_id))?
            .clone();

        let instrument = self
            .instruments
            .get(instrument_id)
            .ok_or_else(|| anyhow!("Instrument '{}' is not running", instrument_id))?;

        let mut module_guard = module.lock().await;
        let requirements = module_guard.required_capabilities();

        let requirement = requirements
            .into_iter()
            .find(|req| req.role == role)
            .ok_or_else(|| anyhow!("Module '{}' does not declare a '{}' role", module_id, role))?;

        if !instrument
            .capabilities
            .iter()
            .any(|cap| *cap == requirement.capability)
        {
            return Err(anyhow!(
                "Instrument '{}' does not provide required capability for role '{}'",
                instrument_id,
                role
            ));
        }

        let proxy = crate::instrument::capabilities::create_proxy(
            requirement.capability,
            instrument_id,
            instrument.command_tx.clone(),
        )?;

        module_guard.assign_instrument(ModuleInstrumentAssignment {
            role: role.to_string(),
            instrument_id: instrument_id.to_string(),
            capability: proxy,
        })?;

        info!(
            "Assigned instrument '{}' to module '{}' role '{}'",
            instrument_id, module_id, role
        );

        self.dependency_graph
            .add_assignment(module_id, role, instrument_id);

        Ok(())
    }

    /// Starts a module's experiment logic.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Module is not found
    /// - Module is already running
    /// - Start operation fails (e.g., missing instrument)
    async fn start_module(&mut self, id: &str) -> Result<()> {
        let module = self
            .modules
            .get_mut(id)
            .ok_or_else(|| anyhow!("Module '{}' is not spawned", id))?;

        let module_clone = module.clone();
        let mut mod_guard = module_clone.lock().await;
        mod_guard.start()?;

        info!("Module '{}' started", id);
        Ok(())
    }

    /// Stops a module's experiment logic.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Module is not found
    /// - Module is not running
    /// - Stop operation fails
    async fn stop_module(&mut self, id: &str) -> Result<()> {
        let module = self
            .modules
            .get_mut(id)
            .ok_or_else(|| anyhow!("Module '{}' is not spawned", id))?;

        let module_clone = module.clone();
        let mut mod_guard = module_clone.lock().await;
        mod_guard.stop()?;

        info!("Module '{}' stopped", id);
        Ok(())
    }

    /// Starts the data recording process by spawning a storage writer task.
    ///
    /// The storage writer:
    /// - Subscribes to the `DataDistributor` to receive all measurements
    /// - Creates a storage writer based on current storage format (CSV, HDF5, Arrow)
    /// - Writes measurements to disk asynchronously
    /// - Handles shutdown signal via oneshot channel
    ///
    /// Recording can be stopped by calling [`stop_recording`](Self::stop_recording).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Recording is already in progress
    /// - Storage format is unsupported or feature-gated
    async fn start_recording(&mut self) -> Result<()> {
        if self.writer_task.is_some() {
            return Err(anyhow!("Recording is already in progress."));
        }

        let settings = Arc::new(self.settings.clone());
        let metadata = self.metadata.clone();
        let mut rx = self.data_distributor.subscribe("storage_writer").await;
        let storage_format_for_task = self.storage_format.clone();

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        let task = self.runtime.spawn(async move {
            let mut writer: Box<dyn crate::core::StorageWriter> =
                match storage_format_for_task.as_str() {
                    "csv" => Box::new(crate::data::storage::CsvWriter::new()),
                    #[cfg(feature = "storage_hdf5")]
                    "hdf5" => Box::new(crate::data::storage::Hdf5Writer::new()),
                    #[cfg(feature = "storage_arrow")]
                    "arrow" => Box::new(crate::data::storage::ArrowWriter::new()),
                    _ => {
                        return Err(anyhow!(
                            "Unsupported storage format: {}",
                            storage_format_for_task
                        ))
                    }
                };

            writer.init(&settings).await?;
            writer.set_metadata(&metadata).await?;

            loop {
                tokio::select! {
                    data_point = rx.recv() => {
                        match data_point {
                            Some(dp) => {
                                if let Err(e) = writer.write(&[dp]).await {
                                    error!("Failed to write data point: {}", e);
                                }
                            }
                            None => {
                                info!("Data channel closed, stopping storage writer");
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Storage writer received shutdown signal");
                        break;
                    }
                }
            }

            writer.shutdown().await?;
            Ok(())
        });

        self.writer_task = Some(task);
        self.writer_shutdown_tx = Some(shutdown_tx);
        info!("Started recording with format: {}", self.storage_format);
        Ok(())
    }

    /// Stops the data recording process with graceful shutdown.
    ///
    /// Shutdown sequence:
    /// 1. Send shutdown signal via oneshot channel
    /// 2. Wait up to 5 seconds for writer to flush buffers
    /// 3. If timeout, abort task forcefully
    ///
    /// The storage writer will call `writer.shutdown()` to ensure
    /// all buffered data is flushed to disk before terminating.
    async fn stop_recording(&mut self) -> Result<(), crate::error::DaqError> {
        if let Some(task) = self.writer_task.take() {
            // Try graceful shutdown first
            info!("Sending shutdown signal to storage writer");
            if let Some(shutdown_tx) = self.writer_shutdown_tx.take() {
                if shutdown_tx.send(()).is_err() {
                    let error_msg = "Failed to send shutdown signal to storage writer (receiver dropped). Aborting task.";
                    log::warn!("{}", error_msg);
                    task.abort();
                    return Err(crate::error::DaqError::Processing(error_msg.to_string()));
                }

                // Wait up to 5 seconds for graceful shutdown
                let timeout_duration = std::time::Duration::from_secs(5);

                match tokio::time::timeout(timeout_duration, task).await {
                    Ok(Ok(Ok(()))) => {
                        info!("Storage writer stopped gracefully");
                        Ok(())
                    }
                    Ok(Ok(Err(e))) => {
                        let error_msg =
                            format!("Storage writer task failed during shutdown: {}", e);
                        log::warn!("{}", error_msg);
                        Err(crate::error::DaqError::Processing(error_msg))
                    }
                    Ok(Err(e)) => {
                        let error_msg =
                            format!("Storage writer task panicked during shutdown: {}", e);
                        log::warn!("{}", error_msg);
                        Err(crate::error::DaqError::Processing(error_msg))
                    }
                    Err(_) => {
                        let error_msg = format!(
                            "Storage writer did not stop within {:?}, aborting",
                            timeout_duration
                        );
                        log::warn!("{}", error_msg);
                        Err(crate::error::DaqError::Processing(error_msg))
                    }
                }
            } else {
                // No shutdown channel, just abort
                let error_msg = "No shutdown channel for storage writer, aborting task";
                log::warn!("{}", error_msg);
                task.abort();
                Err(crate::error::DaqError::Processing(error_msg.to_string()))
            }
        } else {
            Ok(())
        }
    }

    /// Saves the current application state to a session file.
    ///
    /// Session files contain:
    /// - List of active instrument IDs
    /// - Storage settings (format, path)
    /// - GUI state (window layout, plot configurations)
    ///
    /// Sessions can be loaded later to restore the application state.
    /// The blocking file I/O is wrapped in spawn_blocking to prevent
    /// blocking the actor task.
    async fn save_session(&self, path: &Path, gui_state: session::GuiState) -> Result<()> {
        let active_instruments: std::collections::HashSet<String> =
            self.instruments.keys().cloned().collect();

        let session = Session {
            active_instruments,
            storage_settings: self.settings.storage.clone(),
            gui_state,
        };

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || session::save_session(&session, &path)).await?
    }

    /// Loads application state from a session file.
    ///
    /// This method:
    /// 1. Stops all currently running instruments
    /// 2. Spawns instruments from the session file
    /// 3. Applies storage settings from the session
    /// 4. Returns GUI state for the caller to restore
    ///
    /// If any instrument fails to start, an error is logged but loading
    /// continues for remaining instruments.
    /// The blocking file I/O is wrapped in spawn_blocking to prevent
    /// blocking the actor task.
    async fn load_session(&mut self, path: &Path) -> Result<session::GuiState> {
        let path = path.to_path_buf();
        let session = tokio::task::spawn_blocking(move || session::load_session(&path)).await??;
        let gui_state = session.gui_state.clone();

        // Stop all current instruments
        let current_instruments: Vec<String> = self.instruments.keys().cloned().collect();
        for id in current_instruments {
            let _ = self.stop_instrument(&id).await;
        }

        // Start instruments from the session
        for id in &session.active_instruments {
            if let Err(e) = self.spawn_instrument(id).await {
                error!("Failed to start instrument from session '{}': {}", id, e);
                // Continue loading other instruments even if one fails
            }
        }

        // Apply storage settings
        self.storage_format = session.storage_settings.default_format.clone();

        Ok(gui_state)
    }

    /// Performs graceful shutdown of all DAQ components.
    ///
    /// Shutdown sequence:
    /// 1. Stop recording (if active)
    /// 2. Stop all running instruments with timeout
    /// 3. Collect any errors for reporting
    ///
    /// Returns `DaqError::ShutdownFailed` if any component failed to stop.
    async fn shutdown(&mut self) -> Result<(), crate::error::DaqError> {
        if self.shutdown_flag {
            return Ok(());
        }
        info!("Shutting down application...");
        self.shutdown_flag = true;

        let mut errors: Vec<crate::error::DaqError> = Vec::new();

        // Stop recording first
        if let Err(e) = self.stop_recording().await {
            errors.push(e);
        }

        // Stop all V1 instruments gracefully
        let instrument_ids: Vec<String> = self.instruments.keys().cloned().collect();
        for id in instrument_ids {
            if let Err(e) = self.stop_instrument(&id).await {
                errors.push(e);
            }
        }

        // Shutdown V3 instruments (Phase 3)
        if let Some(ref v3_manager) = self.instrument_manager_v3 {
            let mut manager_guard = v3_manager.lock().await;
            if let Err(e) = manager_guard.shutdown_all().await {
                error!("V3 instrument shutdown error: {}", e);
                errors.push(crate::error::DaqError::Instrument(format!(
                    "V3 shutdown failed: {}",
                    e
                )));
            }
            drop(manager_guard);
        }

        info!("Application shutdown complete");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::error::DaqError::ShutdownFailed(errors))
        }
    }

    /// Dynamically adds a new instrument at runtime using inline configuration.
    ///
    /// This method creates and spawns an instrument without requiring TOML
    /// configuration file modification. The instrument configuration is provided
    /// inline and is not persisted - it will not survive application restart.
    ///
    /// Unlike `spawn_instrument()` which reads from Settings, this method accepts
    /// TOML configuration directly. Processors are not supported for dynamically
    /// added instruments in the MVP implementation.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier for the new instrument
    /// * `instrument_type` - Type of instrument (must be registered in registry)
    /// * `config` - TOML configuration for the instrument
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Instrument with this ID is already running
    /// - Instrument type is not registered
    /// - Connection to hardware fails
    async fn add_instrument_dynamic(
        &mut self,
        id: &str,
        instrument_type: &str,
        _config: toml::Value,
    ) -> Result<()> {
        self.version_manager
            .create_snapshot(&self.settings, None)
            .await?;
        if self.instruments.contains_key(id) {
            return Err(anyhow!(
                "Instrument '{}' is already running - cannot add duplicate",
                id
            ));
        }

        // Create instrument from registry
        let mut instrument = self
            .instrument_registry
            .create(instrument_type, id)
            .ok_or_else(|| {
                anyhow!(
                    "Instrument type '{}' not registered in registry",
                    instrument_type
                )
            })?;

        info!(
            "Dynamically adding instrument '{}' of type '{}'",
            id, instrument_type
        );

        let data_distributor = self.data_distributor.clone();
        let settings = Arc::new(self.settings.clone());
        let id_clone = id.to_string();

        // Create command channel
        let (command_tx, mut command_rx) =
            tokio::sync::mpsc::channel(settings.application.command_channel_capacity);

        // Try to connect asynchronously
        instrument
            .connect(&id_clone, &settings)
            .await
            .with_context(|| format!("Failed to connect to instrument '{}'", id_clone))?;

        info!("Instrument '{}' connected.", id_clone);

        let capabilities = instrument.capabilities();

        // Spawn instrument task (no processors for dynamic instruments in MVP)
        let task: JoinHandle<Result<()>> = self.runtime.spawn(async move {
            let mut stream = instrument
                .measure()
                .data_stream()
                .await
                .context("Failed to get data stream")?;
            loop {
                tokio::select! {
                    data_point_option = stream.recv() => {
                        match data_point_option {
                            Some(dp) => {
                                // Convert to daq_core::Measurement
                                let measurement: daq_core::Measurement = (*dp).clone().into();
                                let measurements = vec![Arc::new(measurement)];

                                // Broadcast measurements (no processor chain for dynamic instruments)
                                for measurement in measurements {
                                    if let Err(e) = data_distributor.broadcast(measurement).await {
                                        error!("Failed to broadcast measurement: {}", e);
                                    }
                                }
                            }
                            None => {
                                error!("Stream closed");
                                break;
                            }
                        }
                    }
                    Some(command) = command_rx.recv() => {
                        match command {
                            crate::core::InstrumentCommand::Shutdown => {
                                info!("Instrument '{}' received shutdown command", id_clone);
                                break;
                            }
                            _ => {
                                if let Err(e) = instrument.handle_command(command).await {
                                    error!("Failed to handle command for '{}': {}", id_clone, e);
                                }
                            }
                        }
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {
                        log::trace!("Instrument stream for {} is idle.", id_clone);
                    }
                }
            }

            // Graceful cleanup after loop breaks
            info!("Instrument '{}' disconnecting...", id_clone);
            instrument
                .disconnect()
                .await
                .context("Failed to disconnect instrument")?;
            info!("Instrument '{}' disconnected successfully", id_clone);
            Ok(())
        });

        let handle = InstrumentHandle {
            task,
            command_tx,
            capabilities,
        };
        self.instruments.insert(id.to_string(), handle);

        info!("Instrument '{}' dynamically added and started", id);
        Ok(())
    }

    /// Dynamically removes an instrument at runtime.
    ///
    /// This method stops and removes a running instrument. If `force` is false,
    /// it validates that no modules are currently using this instrument before
    /// removal. If `force` is true, dependency validation is bypassed.
    ///
    /// # Arguments
    ///
    /// * `id` - Instrument identifier to remove
    /// * `force` - If true, bypass dependency validation
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Instrument is not running
    /// - Instrument is assigned to a module (when force=false)
    /// - Graceful shutdown fails
    pub async fn remove_instrument_dynamic(&mut self, id: &str, force: bool) -> Result<()> {
        self.version_manager
            .create_snapshot(&self.settings, None)
            .await?;
        // Check if instrument exists
        if !self.instruments.contains_key(id) {
            return Err(anyhow!("Instrument '{}' is not running", id));
        }

        // Check module dependencies unless force=true
        if !force {
            if let Err(dependents) = self.dependency_graph.can_remove(id) {
                return Err(anyhow!(
                    "Cannot remove instrument '{}': in use by modules {:?}. Use force=true to override.",
                    id, dependents
                ));
            }
        }

        info!("Dynamically removing instrument '{}' (force={})", id, force);

        // Stop the instrument gracefully
        self.stop_instrument(id)
            .await
            .with_context(|| format!("Failed to stop instrument '{}'", id))?;

        // After successful removal:
        self.dependency_graph.remove_all(id);

        info!("Instrument '{}' successfully removed", id);
        Ok(())
    }

    /// Updates a parameter on a running instrument.
    ///
    /// This method sends a `SetParameter` command to the specified instrument.
    /// The parameter value is provided as a string and converted to
    /// `ParameterValue::String` for the MVP implementation.
    ///
    /// # Arguments
    ///
    /// * `id` - Instrument identifier
    /// * `parameter` - Parameter name
    /// * `value` - Parameter value (as string)
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Instrument is not running
    /// - Command channel is full or closed
    /// - Instrument rejects the parameter update
    async fn update_instrument_parameter(
        &self,
        id: &str,
        parameter: &str,
        value: &str,
    ) -> Result<()> {
        self.version_manager
            .create_snapshot(&self.settings, None)
            .await?;
        info!(
            "Updating instrument '{}' parameter '{}' to '{}'",
            id, parameter, value
        );

        // For MVP, we convert the string value to ParameterValue::String
        // A more sophisticated implementation would parse the value type
        let param_value = crate::core::ParameterValue::String(value.to_string());
        let command =
            crate::core::InstrumentCommand::SetParameter(parameter.to_string(), param_value);

        self.send_instrument_command(id, command)
            .await
            .with_context(|| {
                format!(
                    "Failed to update parameter '{}' on instrument '{}'",
                    parameter, id
                )
            })?;

        info!(
            "Parameter '{}' on instrument '{}' updated successfully",
            parameter, id
        );
        Ok(())
    }

    /// Returns a snapshot of current DataDistributor metrics for observability endpoints
    pub async fn distributor_metrics_snapshot(&self) -> Vec<SubscriberMetricsSnapshot> {
        self.data_distributor.metrics_snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApplicationSettings, Settings, StorageSettings, TimeoutSettings};
    use crate::instrument::capabilities::position_control_capability_id;
    use crate::measurement::InstrumentMeasurement;
    use crate::modules::{ModuleCapabilityRequirement, ModuleStatus};
    use std::any::TypeId;
    use std::collections::HashMap;
    use tokio::runtime::Runtime;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedSender;

    struct TestModule {
        name: String,
        notifier: UnboundedSender<(String, TypeId)>,
    }

    impl Module for TestModule {
        fn name(&self) -> &str {
            &self.name
        }

        fn init(&mut self, _config: ModuleConfig) -> Result<()> {
            Ok(())
        }

        fn status(&self) -> ModuleStatus {
            ModuleStatus::Idle
        }

        fn required_capabilities(&self) -> Vec<ModuleCapabilityRequirement> {
            vec![ModuleCapabilityRequirement::new(
                "stage",
                position_control_capability_id(),
            )]
        }

        fn assign_instrument(&mut self, assignment: ModuleInstrumentAssignment) -> Result<()> {
            self.notifier
                .send((
                    assignment.instrument_id.clone(),
                    assignment.capability.capability_id(),
                ))
                .map_err(|e| anyhow!("failed to record assignment: {}", e))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn assigns_capability_proxy_to_module_role() {
        let settings = Settings {
            log_level: "info".to_string(),
            application: ApplicationSettings {
                broadcast_channel_capacity: 64,
                command_channel_capacity: 16,
                data_distributor: Default::default(),
                timeouts: TimeoutSettings::default(),
            },
            storage: StorageSettings {
                default_path: "./data".to_string(),
                default_format: "csv".to_string(),
            },
            instruments: HashMap::new(),
            processors: None,
            instruments_v3: Vec::new(),
        };

        let runtime = Arc::new(Runtime::new().expect("runtime"));
        let mut actor = DaqManagerActor::<InstrumentMeasurement>::new(
            settings,
            Arc::new(InstrumentRegistry::new()),
            Arc::new(crate::instrument::InstrumentRegistryV2::new()),
            Arc::new(ProcessorRegistry::new()),
            Arc::new(crate::modules::ModuleRegistry::<InstrumentMeasurement>::new()),
            runtime.clone(),
        )
        .expect("actor created");

        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let module: Box<dyn Module> = Box::new(TestModule {
            name: "module".to_string(),
            notifier: notify_tx,
        });
        actor
            .modules
            .insert("module".to_string(), Arc::new(Mutex::new(module)));

        let (command_tx, _command_rx) = mpsc::channel(4);
        let task = runtime.spawn(async { Ok::<(), anyhow::Error>(()) });
        actor.instruments.insert(
            "stage".to_string(),
            InstrumentHandle {
                task,
                command_tx,
                capabilities: vec![position_control_capability_id()],
            },
        );

        actor
            .assign_instrument_to_module("module", "stage", "stage")
            .await
            .expect("assignment succeeds");

        let (instrument_id, capability) = notify_rx
            .recv()
            .await
            .expect("module assignment notification");
        assert_eq!(instrument_id, "stage");
        assert_eq!(capability, position_control_capability_id());

        drop(actor);
        if let Ok(rt) = Arc::try_unwrap(runtime) {
            rt.shutdown_background();
        }
    }
}
