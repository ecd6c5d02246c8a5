//! Single-owner worker thread for concurrent use of one connection.
//!
//! The HID handle has no framing to tell a status response from an event or
//! a write echo, so two readers on one handle steal each other's reports.
//! [`HeadsetWorker`] moves the [`Headset`] into one thread that runs
//! requests from a channel in arrival order and, between requests, polls for
//! events and broadcasts them to subscribers.
//!
//! ```text
//! callers --(mpsc: job + oneshot reply)--> [worker thread: Headset] --(broadcast)--> subscribers
//! ```

use crate::comm::ErrorClass;
use crate::device::NcMode;
use crate::error::{Error, Result};
use crate::event::{Event, StopToken};
use crate::headset::Headset;
use crate::protocol::SettingValue;
use crate::status::{AudioStatus, FullStatus, NcStatus, SystemStatus};
use crate::transport::{HidApiOpener, TransportOpener};
use std::thread::JoinHandle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

/// Broadcast channel capacity for events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Requests queued before callers wait.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

type Job<O> = Box<dyn FnOnce(&mut Headset<O>) + Send>;

/// Handle to the thread owning a connection.
///
/// Dropping the handle stops the thread and closes the connection.
pub struct HeadsetWorker<O = HidApiOpener>
where
    O: TransportOpener + Send + 'static,
{
    jobs: mpsc::Sender<Job<O>>,
    events: broadcast::Receiver<Event>,
    stop: StopToken,
    thread: Option<JoinHandle<()>>,
}

impl<O> HeadsetWorker<O>
where
    O: TransportOpener + Send + 'static,
{
    /// Move an open connection into a new worker thread.
    pub fn spawn(headset: Headset<O>) -> Result<Self> {
        if !headset.is_open() {
            return Err(Error::DeviceNotFound("device not connected".into()));
        }

        let (jobs, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (event_tx, events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stop = StopToken::new();

        let thread = std::thread::Builder::new()
            .name("zoneout-worker".into())
            .spawn({
                let stop = stop.clone();
                move || run_worker(headset, rx, event_tx, stop)
            })
            .map_err(|e| Error::Hid(format!("spawn worker thread: {e}")))?;

        Ok(Self {
            jobs,
            events,
            stop,
            thread: Some(thread),
        })
    }

    /// Receive every event polled from now on. The receiver reports
    /// `Closed` once the worker exits.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.resubscribe()
    }

    /// Whether the worker thread is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.jobs.is_closed()
    }

    fn job<R, F>(f: F) -> (Job<O>, oneshot::Receiver<Result<R>>)
    where
        F: FnOnce(&mut Headset<O>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<O> = Box::new(move |headset| {
            let _ = tx.send(f(headset));
        });
        (job, rx)
    }

    /// Run `f` on the worker thread with exclusive access to the connection.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Headset<O>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (job, rx) = Self::job(f);
        self.jobs.send(job).await.map_err(|_| Error::WorkerStopped)?;
        rx.await.map_err(|_| Error::WorkerStopped)?
    }

    /// Blocking form of [`Self::call`]. Must not be called from inside an
    /// async runtime.
    pub fn blocking_call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Headset<O>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (job, rx) = Self::job(f);
        self.jobs
            .blocking_send(job)
            .map_err(|_| Error::WorkerStopped)?;
        rx.blocking_recv().map_err(|_| Error::WorkerStopped)?
    }

    pub async fn get_audio_status(&self) -> Result<AudioStatus> {
        self.call(|h| h.get_audio_status()).await
    }

    pub async fn get_nc_status(&self) -> Result<NcStatus> {
        self.call(|h| h.get_nc_status()).await
    }

    pub async fn get_system_status(&self) -> Result<SystemStatus> {
        self.call(|h| h.get_system_status()).await
    }

    pub async fn get_all(&self) -> Result<FullStatus> {
        self.call(|h| h.get_all()).await
    }

    pub async fn set_volume(&self, value: i32) -> Result<()> {
        self.call(move |h| h.set_volume(value)).await
    }

    pub async fn set_balance(&self, value: i32) -> Result<()> {
        self.call(move |h| h.set_balance(value)).await
    }

    pub async fn set_nc_mode(&self, mode: NcMode) -> Result<()> {
        self.call(move |h| h.set_nc_mode(mode)).await
    }

    pub async fn set_ambient_sound(&self, level: i32, focus: bool) -> Result<()> {
        self.call(move |h| h.set_ambient_sound(level, focus)).await
    }

    pub async fn send_setting(&self, name: &'static str, value: SettingValue) -> Result<()> {
        self.call(move |h| h.send_setting(name, value)).await
    }

    /// Stop the worker and wait for it to close the connection.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Headset worker thread panicked");
            }
        }
    }
}

impl<O> Drop for HeadsetWorker<O>
where
    O: TransportOpener + Send + 'static,
{
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_worker<O: TransportOpener>(
    mut headset: Headset<O>,
    mut jobs: mpsc::Receiver<Job<O>>,
    events: broadcast::Sender<Event>,
    stop: StopToken,
) {
    debug!("Headset worker started");
    let poll_ms = headset.timing().worker_poll_ms;

    while !stop.is_stopped() {
        match jobs.try_recv() {
            Ok(job) => {
                job(&mut headset);
                continue;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match headset.poll_event(poll_ms) {
            Ok(Some(event)) => {
                // No subscribers is fine.
                let _ = events.send(event);
            }
            Ok(None) => {}
            Err(e) => {
                let class = ErrorClass::classify(&e);
                if class.keeps_connection() {
                    debug!(error = %e, "Event poll failed; continuing");
                    continue;
                }
                warn!(error = %e, ?class, "Event poll failed; stopping worker");
                break;
            }
        }
    }

    headset.close();
    debug!("Headset worker stopped");
}
