//! Bambu Controller Implementation
//!
//! Owns one printer session: feeds raw report payloads into the device
//! model, announces what changed on the event bus, and relays validated
//! commands to the transport.

use super::commands::{check_supported, project_file_command, start_gate, PrinterCommand};
use super::device::{Device, DeviceSnapshot, UpdateSummary};
use super::print_job::JobCache;
use super::report::Report;
use crate::communication::{request_topic, Transport};
use crate::firmware::capabilities::Feature;
use bambukit_core::{
    AppEvent, CommandEvent, DeviceEvent, DeviceType, EventBus, EventCategory, EventFilter,
    GcodeState, ModelError, RegistryEvent, Result, SubscriptionId,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Applies payloads to the shared model
///
/// Cloned into the ingestion task.
#[derive(Clone)]
struct Ingest {
    serial: String,
    device: Arc<RwLock<Device>>,
    events: Arc<EventBus>,
}

impl Ingest {
    fn apply(
        &self,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> std::result::Result<UpdateSummary, ModelError> {
        let report = match Report::from_slice(payload) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Dropping report from {}: {}", self.serial, e);
                self.events.publish(AppEvent::Device(DeviceEvent::ReportRejected {
                    serial: self.serial.clone(),
                    reason: e.to_string(),
                }));
                return Err(e);
            }
        };

        let summary = {
            let mut device = self.device.write();
            let state_before = device.info().gcode_state();
            let mut summary = UpdateSummary::default();
            for fragment in report.fragments() {
                let step = device.update_at(fragment, now);
                summary.discovered_ams.extend(step.discovered_ams);
                summary.device_type_resolved =
                    summary.device_type_resolved.or(step.device_type_resolved);
            }
            let state_after = device.info().gcode_state();
            if state_after != state_before {
                summary.gcode_state_changed = Some((state_before, state_after));
            }
            summary
        };

        // Listeners run without the model lock held
        self.announce(&summary);
        Ok(summary)
    }

    fn announce(&self, summary: &UpdateSummary) {
        if let Some(device_type) = summary.device_type_resolved {
            self.events.publish(AppEvent::Device(DeviceEvent::TypeResolved {
                serial: self.serial.clone(),
                device_type,
            }));
        }
        if let Some((from, to)) = summary.gcode_state_changed {
            tracing::debug!("{}: job phase {} -> {}", self.serial, from, to);
            self.events
                .publish(AppEvent::Device(DeviceEvent::GcodeStateChanged {
                    serial: self.serial.clone(),
                    from,
                    to,
                }));
        }
        for &index in &summary.discovered_ams {
            self.events
                .publish(AppEvent::Registry(RegistryEvent::AmsUnitDiscovered {
                    serial: self.serial.clone(),
                    index,
                }));
        }
    }
}

/// Bambu printer session
pub struct BambuController {
    ingest: Ingest,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn JobCache>,
    /// Ingestion task handle
    io_task: Mutex<Option<JoinHandle<()>>>,
    /// Shutdown signal
    shutdown_signal: Mutex<Option<mpsc::Sender<()>>>,
}

impl BambuController {
    /// Create a session for a printer
    pub fn new(device: Device, transport: Arc<dyn Transport>, cache: Arc<dyn JobCache>) -> Self {
        Self::with_event_bus(device, transport, cache, Arc::new(EventBus::new()))
    }

    /// Create a session that publishes on a shared event bus
    pub fn with_event_bus(
        device: Device,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn JobCache>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            ingest: Ingest {
                serial: device.serial().to_string(),
                device: Arc::new(RwLock::new(device)),
                events,
            },
            transport,
            cache,
            io_task: Mutex::new(None),
            shutdown_signal: Mutex::new(None),
        }
    }

    /// Printer serial
    pub fn serial(&self) -> &str {
        &self.ingest.serial
    }

    /// Event bus this session publishes on
    pub fn events(&self) -> &Arc<EventBus> {
        &self.ingest.events
    }

    /// Apply one raw report payload
    ///
    /// An undecodable payload is logged, announced and returned as an
    /// error; the model is left untouched.
    pub fn handle_payload(&self, payload: &[u8]) -> std::result::Result<UpdateSummary, ModelError> {
        self.ingest.apply(payload, Utc::now())
    }

    /// Apply one raw report payload observed at `now`
    pub fn handle_payload_at(
        &self,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> std::result::Result<UpdateSummary, ModelError> {
        self.ingest.apply(payload, now)
    }

    /// Start the session
    ///
    /// Asks the printer for its module list and a full status push, then
    /// spawns a task that applies `reports` in delivery order until the
    /// channel closes or [`stop`](Self::stop) is called. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, mut reports: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        self.stop();

        self.send_command(PrinterCommand::GetVersion)?;
        self.send_command(PrinterCommand::PushAll)?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let ingest = self.ingest.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!("Ingestion started for {}", ingest.serial);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    payload = reports.recv() => match payload {
                        Some(payload) => {
                            // Errors are already logged; keep going
                            let _ = ingest.apply(&payload, Utc::now());
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("Ingestion stopped for {}", ingest.serial);
        });

        *self.shutdown_signal.lock() = Some(shutdown_tx);
        *self.io_task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the ingestion task, if running
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown_signal.lock().take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.io_task.lock().take() {
            handle.abort();
        }
    }

    /// Check whether the ingestion task is running
    pub fn is_running(&self) -> bool {
        self.io_task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Owned copy of the model
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.ingest.device.read().snapshot()
    }

    /// Printer model
    pub fn device_type(&self) -> DeviceType {
        self.ingest.device.read().device_type()
    }

    /// Current job phase
    pub fn gcode_state(&self) -> GcodeState {
        self.ingest.device.read().info().gcode_state()
    }

    /// Check whether the printer has a feature
    pub fn supports_feature(&self, feature: Feature) -> bool {
        self.ingest.device.read().supports_feature(feature)
    }

    /// Run a closure against the model under the read lock
    pub fn with_device<R>(&self, f: impl FnOnce(&Device) -> R) -> R {
        f(&self.ingest.device.read())
    }

    /// Start a cached job
    ///
    /// Refused without any transport I/O unless the printer is idle and
    /// the job's configuration names a gcode file. Publishes exactly one
    /// document on success.
    pub fn start_print(&self, job_name: &str) -> Result<()> {
        let state = self.gcode_state();
        let built = start_gate(state).and_then(|_| project_file_command(&*self.cache, job_name));
        let command = match built {
            Ok(command) => command,
            Err(e) => {
                self.reject(&e.to_string());
                return Err(e.into());
            }
        };

        tracing::info!("Starting {} on {}", job_name, self.serial());
        self.publish(&command)
    }

    /// Request a full status push
    pub fn request_full_status(&self) -> Result<()> {
        self.send_command(PrinterCommand::PushAll)
    }

    /// Send a command after checking the printer has the hardware for it
    pub fn send_command(&self, command: PrinterCommand) -> Result<()> {
        let supported = {
            let device = self.ingest.device.read();
            check_supported(&device, &command)
        };
        if let Err(e) = supported {
            self.reject(&e.to_string());
            return Err(e.into());
        }
        self.publish(&command)
    }

    /// Register a listener for newly discovered AMS units
    ///
    /// Called once per unit index, after the update that discovered it has
    /// been applied.
    pub fn on_registry_changed<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let serial = self.ingest.serial.clone();
        self.ingest.events.subscribe(
            EventFilter::Categories(vec![EventCategory::Registry]),
            move |event| {
                if let AppEvent::Registry(RegistryEvent::AmsUnitDiscovered {
                    serial: ref source,
                    index,
                }) = event
                {
                    if *source == serial {
                        listener(index);
                    }
                }
            },
        )
    }

    fn publish(&self, command: &PrinterCommand) -> Result<()> {
        let topic = request_topic(self.serial());
        self.transport.publish(&topic, command.to_json())?;
        tracing::debug!("Published {} to {}", command.name(), topic);
        self.ingest
            .events
            .publish(AppEvent::Command(CommandEvent::Published {
                serial: self.ingest.serial.clone(),
                command: command.name().to_string(),
            }));
        Ok(())
    }

    fn reject(&self, reason: &str) {
        tracing::warn!("Command refused for {}: {}", self.serial(), reason);
        self.ingest
            .events
            .publish(AppEvent::Command(CommandEvent::Rejected {
                serial: self.ingest.serial.clone(),
                reason: reason.to_string(),
            }));
    }
}

impl Drop for BambuController {
    fn drop(&mut self) {
        self.stop();
    }
}
