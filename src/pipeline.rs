//! Pipeline lifecycle
//!
//! Owns everything shared between the stages (queue, tilt cell, shutdown
//! token) and starts them in order: transport sender, tilt debounce,
//! acquisition worker, poll scheduler. A tilt sensor that cannot be bound or
//! armed does not stop the pipeline: gamepad data keeps flowing with tilt
//! unknown and the failure is kept for the caller in
//! [`Pipeline::tilt_error`].

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;

use statum::{machine, state};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::acquisition::{
    AcquisitionWorker, BusError, FrameBus, PollScheduler, WiiExtensionBus, WorkTrigger,
};
use crate::config::{AppConfig, ConfigError};
use crate::delivery::{DeliveryQueue, HidGadget, ReportTransport, TransportError, TransportSender};
use crate::report::ReportPacker;
use crate::tilt::{
    tilt_cell, DebounceError, GpioTiltPin, SensorError, TiltDebouncer, TiltPin, TiltReader,
    TiltState, TiltWriter,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Bus error: {0}")]
    BusError(#[from] BusError),

    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("Tilt sensor error: {0}")]
    SensorError(#[from] SensorError),

    #[error("Debounce error: {0}")]
    DebounceError(#[from] DebounceError),

    #[error("Initialization error: {0}")]
    InitializationError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum PipelineState {
    Assembled,
    Running,
}

#[machine]
pub struct Pipeline<S: PipelineState> {
    config: AppConfig,
    queue: Arc<DeliveryQueue>,
    // Taken by the debounce callback on start
    tilt_writer: Option<TiltWriter>,
    tilt_reader: TiltReader,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    debouncer: Option<TiltDebouncer>,
    // Why the tilt sensor is not running, if it should be
    tilt_error: Option<PipelineError>,
}

impl<S: PipelineState> Pipeline<S> {
    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    /// Currently published tilt state
    pub fn tilt(&self) -> TiltState {
        self.tilt_reader.snapshot()
    }
}

impl Pipeline<Assembled> {
    /// Validates `config` and creates the shared state. Nothing runs yet.
    pub fn assemble(config: AppConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let capacity = NonZeroUsize::new(config.delivery.queue_capacity).ok_or_else(|| {
            PipelineError::InitializationError("queue capacity must be positive".to_string())
        })?;
        let queue = Arc::new(DeliveryQueue::with_capacity(capacity));
        let (tilt_writer, tilt_reader) = tilt_cell();

        debug!("Pipeline assembled: {:?}", config);
        Ok(Self::new(
            config,
            queue,
            Some(tilt_writer),
            tilt_reader,
            CancellationToken::new(),
            Vec::new(),
            None,
            None,
        ))
    }

    /// Opens the guitar bus, the HID gadget and (if enabled) the tilt GPIO
    /// described by the config, then starts the pipeline on them.
    pub async fn start_hardware(mut self) -> Result<Pipeline<Running>, PipelineError> {
        let bus = WiiExtensionBus::open(&self.config.acquisition)?;
        let transport = HidGadget::open(&self.config.delivery.hid_device).await?;

        let tilt_pin: Option<Box<dyn TiltPin>> = if self.config.tilt.enabled {
            match GpioTiltPin::open(&self.config.tilt) {
                Ok(pin) => Some(Box::new(pin)),
                Err(e) => {
                    self.tilt_unavailable(e);
                    None
                }
            }
        } else {
            info!("Tilt sensor disabled in config");
            None
        };

        self.start(bus, transport, tilt_pin)
    }

    fn tilt_unavailable(&mut self, error: SensorError) {
        error!("Tilt sensor unavailable, continuing without it: {}", error);
        self.tilt_error = Some(error.into());
    }

    /// Spawns every stage onto the current runtime.
    pub fn start<B, T>(
        mut self,
        bus: B,
        transport: T,
        tilt_pin: Option<Box<dyn TiltPin>>,
    ) -> Result<Pipeline<Running>, PipelineError>
    where
        B: FrameBus,
        T: ReportTransport,
    {
        let poll_rate = NonZeroU32::new(self.config.acquisition.poll_rate_hz).ok_or_else(|| {
            PipelineError::InitializationError("poll rate must be positive".to_string())
        })?;

        info!("Starting pipeline");

        let sender = TransportSender::new(self.queue.clone(), transport);
        self.tasks
            .push(tokio::spawn(sender.run(self.shutdown.clone())));

        match (tilt_pin, self.tilt_writer.take()) {
            (Some(pin), Some(writer)) => {
                let settings = self.config.tilt.debounce_settings();
                let publish = move |tilted: bool| {
                    let state = TiltState::from(tilted);
                    debug!("Publishing tilt state {:?}", state);
                    writer.publish(state);
                };
                match TiltDebouncer::spawn(pin, settings, publish) {
                    Ok(debouncer) => self.debouncer = Some(debouncer),
                    Err(e) => {
                        error!("Tilt debounce not running, tilt stays unknown: {}", e);
                        self.tilt_error = Some(e.into());
                    }
                }
            }
            (Some(_), None) => warn!("Tilt writer already taken, ignoring tilt pin"),
            (None, _) => info!("No tilt sensor, tilt stays unknown"),
        }

        let trigger = WorkTrigger::new();
        let packer = ReportPacker::new(self.config.report);
        let worker = AcquisitionWorker::new(bus, self.tilt_reader.clone(), packer, self.queue.clone());
        self.tasks
            .push(tokio::spawn(worker.run(trigger.clone(), self.shutdown.clone())));

        let scheduler = PollScheduler::new(poll_rate, trigger);
        self.tasks
            .push(tokio::spawn(scheduler.run(self.shutdown.clone())));

        info!(
            "Pipeline running at {} Hz, queue capacity {}",
            poll_rate,
            self.queue.capacity()
        );
        Ok(self.transition())
    }
}

impl Pipeline<Running> {
    /// Binding or arming failure of the tilt sensor. `None` when the
    /// sensor runs or was disabled in the config.
    pub fn tilt_error(&self) -> Option<&PipelineError> {
        self.tilt_error.as_ref()
    }

    /// Stops the tilt interrupt, cancels all stages and waits for them.
    pub async fn shutdown(mut self) {
        info!("Shutting down pipeline");

        if let Some(mut debouncer) = self.debouncer.take() {
            debouncer.shutdown();
        }
        self.shutdown.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Pipeline task ended abnormally: {}", e);
            }
        }
        info!("Pipeline stopped");
    }
}
