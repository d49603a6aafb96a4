//! Background compute engine
//!
//! Runs on the worker thread. Each request is answered with exactly one
//! success or error response, preceded by any progress it produced.
//! Per-job failures never stop the loop.

use super::protocol::{JobId, JobType, Request, Response};
use crate::error::EngineError;
use crate::spectrum::{assemble, AudioInput, ProgressEvent, SpectrogramResult};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Execute one request and build its final response
///
/// Progress events are handed to `progress` as they occur.
pub fn process_request(
    request: Request,
    progress: &mut impl FnMut(ProgressEvent),
) -> Response {
    let job_id = request.job_id;
    debug!("Job {}: starting {}", job_id, request.job_type);

    match run_job(request, progress) {
        Ok(result) => {
            debug!(
                "Job {}: finished ({} frames x {} bins)",
                job_id, result.metadata.num_frames, result.metadata.freq_bins
            );
            Response::Success { job_id, result }
        }
        Err(e) => {
            warn!("Job {}: {}", job_id, e);
            Response::Failure {
                job_id,
                error: e.to_string(),
            }
        }
    }
}

fn run_job(
    request: Request,
    progress: &mut impl FnMut(ProgressEvent),
) -> Result<SpectrogramResult, EngineError> {
    match request.job_type {
        JobType::GenerateSpectrogram => {
            let audio = match request.audio_data {
                Some(data) => AudioInput::try_from(data)?,
                None => AudioInput::Mono(Vec::new()),
            };
            Ok(assemble(&audio, &request.options, progress)?)
        }
        JobType::Other(name) => Err(EngineError::UnsupportedJobType(name)),
    }
}

/// Worker loop: serve requests one at a time until the request channel
/// closes or nobody is listening for responses
pub fn run(requests: Receiver<Request>, responses: Sender<Response>) {
    debug!("Spectrogram worker started");

    for request in requests.iter() {
        let mut forward = |event: ProgressEvent| {
            let _ = responses.send(Response::progress(event));
        };
        let job_id = request.job_id;
        let response = contain_panic(job_id, || process_request(request, &mut forward));

        if responses.send(response).is_err() {
            debug!("Response channel closed, dropping result");
            break;
        }
    }

    debug!("Spectrogram worker stopped");
}

/// Run `job`, turning a panic into an error response for `job_id`
///
/// The worker thread outlives any single job.
fn contain_panic(job_id: JobId, job: impl FnOnce() -> Response) -> Response {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Job {}: panicked: {}", job_id, message);
        Response::Failure {
            job_id,
            error: message,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "background job panicked".to_string()
    }
}
