//! Messages exchanged between the dispatcher and the background worker
//!
//! Field names follow the JSON wire format (camelCase), so every message
//! can be carried over any transport with [`Request::to_json`] and
//! [`Response::to_json`].

use crate::error::SpectrogramError;
use crate::spectrum::{AudioInput, ProgressEvent, SpectrogramOptions, SpectrogramResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Job identifier, assigned from 1 upwards by the dispatcher
pub type JobId = u64;

/// Kind of work a request asks for
///
/// Unknown names are kept so the worker can report them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobType {
    GenerateSpectrogram,
    Other(String),
}

impl JobType {
    pub fn as_str(&self) -> &str {
        match self {
            JobType::GenerateSpectrogram => "generateSpectrogram",
            JobType::Other(name) => name,
        }
    }
}

impl From<String> for JobType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "generateSpectrogram" => JobType::GenerateSpectrogram,
            _ => JobType::Other(name),
        }
    }
}

impl From<JobType> for String {
    fn from(job_type: JobType) -> Self {
        match job_type {
            JobType::GenerateSpectrogram => "generateSpectrogram".to_string(),
            JobType::Other(name) => name,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio payload as it appears on the wire
///
/// Either a flat sample array or a list of one or two channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioData {
    Samples(Vec<f32>),
    Channels(Vec<Vec<f32>>),
}

impl TryFrom<AudioData> for AudioInput {
    type Error = SpectrogramError;

    fn try_from(data: AudioData) -> Result<Self, Self::Error> {
        match data {
            AudioData::Samples(samples) => Ok(AudioInput::Mono(samples)),
            AudioData::Channels(channels) => {
                let count = channels.len();
                let mut channels = channels.into_iter();
                match (channels.next(), channels.next()) {
                    (None, _) => Err(SpectrogramError::invalid_input("No audio data provided")),
                    (Some(mono), None) => Ok(AudioInput::Mono(mono)),
                    (Some(left), Some(right)) if count == 2 => {
                        Ok(AudioInput::Stereo(left, right))
                    }
                    _ => Err(SpectrogramError::invalid_input(format!(
                        "Unsupported channel count: {}",
                        count
                    ))),
                }
            }
        }
    }
}

impl From<AudioInput> for AudioData {
    fn from(audio: AudioInput) -> Self {
        match audio {
            AudioInput::Mono(samples) => AudioData::Samples(samples),
            AudioInput::Stereo(left, right) => AudioData::Channels(vec![left, right]),
        }
    }
}

/// Job request sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub job_id: JobId,

    #[serde(rename = "type")]
    pub job_type: JobType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<AudioData>,

    #[serde(default)]
    pub options: SpectrogramOptions,
}

impl Request {
    pub fn generate_spectrogram(
        job_id: JobId,
        audio: AudioInput,
        options: SpectrogramOptions,
    ) -> Self {
        Self {
            job_id,
            job_type: JobType::GenerateSpectrogram,
            audio_data: Some(audio.into()),
            options,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Message sent back by the worker
///
/// Progress carries no job id (`jobId: null`); it is engine-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Progress {
        job_id: Option<JobId>,
        progress: ProgressEvent,
    },

    #[serde(rename_all = "camelCase")]
    Failure { job_id: JobId, error: String },

    #[serde(rename_all = "camelCase")]
    Success {
        job_id: JobId,
        result: SpectrogramResult,
    },
}

impl Response {
    pub fn progress(progress: ProgressEvent) -> Self {
        Response::Progress {
            job_id: None,
            progress,
        }
    }

    /// Job this message settles, `None` for progress
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Response::Progress { .. } => None,
            Response::Failure { job_id, .. } | Response::Success { job_id, .. } => Some(*job_id),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
