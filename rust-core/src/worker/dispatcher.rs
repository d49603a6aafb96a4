//! Foreground job dispatcher
//!
//! The dispatcher owns two threads. The worker thread runs the compute
//! engine and processes one job at a time in arrival order. The router
//! thread owns the pending-job table: it forwards requests to the worker,
//! matches responses to their jobs and delivers progress to the callback.
//! Both sides talk only through channels.

use super::engine;
use super::protocol::{AudioData, JobId, JobType, Request, Response};
use crate::error::{DispatcherError, JobError};
use crate::spectrum::{AudioInput, ProgressEvent, SpectrogramOptions, SpectrogramResult};
use crossbeam_channel::{
    bounded, never, select, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outcome delivered to a [`JobHandle`]
pub type JobResult = Result<SpectrogramResult, JobError>;

type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Name of the thread running the compute engine
    pub worker_thread_name: String,

    /// Name of the thread correlating responses with jobs
    pub router_thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: "spectrogram-worker".to_string(),
            router_thread_name: "spectrogram-router".to_string(),
        }
    }
}

/// Pending result of a submitted job
///
/// Settled exactly once, with the job's result or the reason it failed.
/// Once received, the outcome stays in the handle and repeated polls
/// return it again.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    reply: Receiver<JobResult>,
    outcome: Option<JobResult>,
}

impl JobHandle {
    fn new(id: JobId, reply: Receiver<JobResult>) -> Self {
        Self {
            id,
            reply,
            outcome: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Block until the job settles
    pub fn wait(self) -> JobResult {
        match self.outcome {
            Some(outcome) => outcome,
            None => self
                .reply
                .recv()
                .unwrap_or(Err(JobError::BackgroundContextFailure)),
        }
    }

    /// Block for at most `timeout`; `None` if the job is still running
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<JobResult> {
        if self.outcome.is_none() {
            self.outcome = match self.reply.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    Some(Err(JobError::BackgroundContextFailure))
                }
            };
        }
        self.outcome.clone()
    }

    /// Non-blocking poll, same contract as [`JobHandle::wait_timeout`]
    pub fn try_result(&mut self) -> Option<JobResult> {
        if self.outcome.is_none() {
            self.outcome = match self.reply.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(JobError::BackgroundContextFailure)),
            };
        }
        self.outcome.clone()
    }

    fn settled(id: JobId, outcome: JobResult) -> Self {
        let (_, rx) = bounded(1);
        Self {
            id,
            reply: rx,
            outcome: Some(outcome),
        }
    }
}

/// Pending-job table plus progress observer
///
/// Every registered job leaves the table exactly once: on its matching
/// response or in a [`Correlator::fail_all`] sweep.
pub(crate) struct Correlator {
    pending: HashMap<JobId, Sender<JobResult>>,
    on_progress: Option<ProgressCallback>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            on_progress: None,
        }
    }

    pub(crate) fn register(&mut self, job_id: JobId, reply: Sender<JobResult>) {
        self.pending.insert(job_id, reply);
    }

    pub(crate) fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    pub(crate) fn handle_response(&mut self, response: Response) {
        match response {
            Response::Progress { progress, .. } => {
                if let Some(callback) = self.on_progress.as_mut() {
                    callback(progress);
                }
            }
            Response::Failure { job_id, error } => self.settle(job_id, Err(JobError::Failed(error))),
            Response::Success { job_id, result } => self.settle(job_id, Ok(result)),
        }
    }

    /// Remove `job_id` and deliver `outcome`; unknown ids are dropped
    pub(crate) fn settle(&mut self, job_id: JobId, outcome: JobResult) {
        match self.pending.remove(&job_id) {
            // The caller may have dropped its handle already
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => warn!("Discarding response for unknown job {}", job_id),
        }
    }

    /// Fail every pending job with `reason` and return how many there were
    pub(crate) fn fail_all(&mut self, reason: JobError) -> usize {
        let count = self.pending.len();
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(reason.clone()));
        }
        count
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

enum Command {
    Submit {
        request: Request,
        reply: Sender<JobResult>,
    },
    SetProgressCallback(ProgressCallback),
    Terminate,
}

/// Foreground state machine, run on the router thread
struct Router {
    correlator: Correlator,
    requests: Sender<Request>,
    worker: Option<JoinHandle<()>>,
    context_lost: bool,
}

impl Router {
    /// Returns the number of jobs rejected at termination
    fn run(mut self, commands: Receiver<Command>, mut responses: Receiver<Response>) -> usize {
        debug!("Dispatcher router started");

        loop {
            let mut disconnected = false;

            select! {
                recv(commands) -> command => match command {
                    Ok(Command::Submit { request, reply }) => self.submit(request, reply),
                    Ok(Command::SetProgressCallback(callback)) => {
                        self.correlator.set_progress_callback(callback)
                    }
                    // A dropped dispatcher counts as termination
                    Ok(Command::Terminate) | Err(_) => break,
                },
                recv(responses) -> response => match response {
                    Ok(response) => self.correlator.handle_response(response),
                    Err(_) => disconnected = true,
                },
            }

            if disconnected {
                self.lose_context();
                responses = never();
            }
        }

        let rejected = self.correlator.fail_all(JobError::Terminated);
        debug!("Dispatcher router stopped, {} pending jobs rejected", rejected);
        rejected
    }

    fn submit(&mut self, request: Request, reply: Sender<JobResult>) {
        let job_id = request.job_id;

        if self.context_lost {
            let _ = reply.send(Err(JobError::BackgroundContextFailure));
            return;
        }

        self.correlator.register(job_id, reply);
        if self.requests.send(request).is_err() {
            self.correlator
                .settle(job_id, Err(JobError::BackgroundContextFailure));
            return;
        }

        debug!(
            "Job {} queued ({} pending)",
            job_id,
            self.correlator.pending_len()
        );
    }

    fn lose_context(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Spectrogram worker panicked");
            }
        }

        let failed = self
            .correlator
            .fail_all(JobError::BackgroundContextFailure);
        error!(
            "Background execution context lost, {} pending jobs failed",
            failed
        );

        self.context_lost = true;
    }
}

/// Submits jobs to a background worker and hands back [`JobHandle`]s
pub struct Dispatcher {
    next_job_id: JobId,
    commands: Sender<Command>,
    router: Option<JoinHandle<usize>>,
}

impl Dispatcher {
    /// Spawn a dispatcher backed by the spectrogram engine
    pub fn new() -> Result<Self, DispatcherError> {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Result<Self, DispatcherError> {
        Self::with_backend(config, engine::run)
    }

    /// Spawn a dispatcher whose worker thread runs `backend`
    ///
    /// The backend receives requests in submission order and must answer
    /// each with one [`Response`]. Returning, or panicking, is treated as
    /// loss of the background context.
    pub fn with_backend<F>(config: DispatcherConfig, backend: F) -> Result<Self, DispatcherError>
    where
        F: FnOnce(Receiver<Request>, Sender<Response>) + Send + 'static,
    {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();

        let worker = thread::Builder::new()
            .name(config.worker_thread_name)
            .spawn(move || backend(request_rx, response_tx))?;

        let router = Router {
            correlator: Correlator::new(),
            requests: request_tx,
            worker: Some(worker),
            context_lost: false,
        };
        let router = thread::Builder::new()
            .name(config.router_thread_name)
            .spawn(move || router.run(command_rx, response_rx))?;

        Ok(Self {
            next_job_id: 1,
            commands: command_tx,
            router: Some(router),
        })
    }

    /// Queue a spectrogram computation
    pub fn generate_spectrogram(
        &mut self,
        audio: AudioInput,
        options: SpectrogramOptions,
    ) -> JobHandle {
        self.submit(JobType::GenerateSpectrogram, Some(audio.into()), options)
    }

    /// Queue an arbitrary request
    pub fn submit(
        &mut self,
        job_type: JobType,
        audio_data: Option<AudioData>,
        options: SpectrogramOptions,
    ) -> JobHandle {
        let job_id = self.next_job_id;
        self.next_job_id += 1;

        let request = Request {
            job_id,
            job_type,
            audio_data,
            options,
        };

        let (reply_tx, reply_rx) = bounded(1);
        if self
            .commands
            .send(Command::Submit {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            return JobHandle::settled(job_id, Err(JobError::Terminated));
        }

        JobHandle::new(job_id, reply_rx)
    }

    /// Register the progress observer, replacing any previous one
    pub fn set_progress_callback(&self, callback: impl FnMut(ProgressEvent) + Send + 'static) {
        let _ = self
            .commands
            .send(Command::SetProgressCallback(Box::new(callback)));
    }

    /// Shut down the background context
    ///
    /// Every job still pending is rejected with [`JobError::Terminated`]
    /// before this returns; the count is returned. A job already running
    /// on the worker is abandoned. Later submissions fail immediately.
    pub fn terminate(&mut self) -> usize {
        let Some(router) = self.router.take() else {
            return 0;
        };

        let _ = self.commands.send(Command::Terminate);
        match router.join() {
            Ok(rejected) => rejected,
            Err(_) => {
                error!("Dispatcher router panicked");
                0
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.router.is_none()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.terminate();
    }
}
