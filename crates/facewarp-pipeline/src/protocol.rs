//! Typed request/response messages for delegating a warp to a worker.
//!
//! Every message carries the [`Generation`] of the request it belongs
//! to, so the caller can recognize and drop responses to superseded
//! requests.

use std::panic::AssertUnwindSafe;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, WebClock, duration_ms};
use crate::params::WarpParams;
use crate::region::RegionModel;
use crate::session::Generation;

/// Worker command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Warp the buffer and apply the effect.
    #[default]
    Process,
}

/// Request posted to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// What to do.
    pub command: Command,
    /// Request identifier, echoed in the response.
    pub generation: Generation,
    /// Source RGBA bytes.
    pub buffer: Vec<u8>,
    /// Declared width.
    pub width: u32,
    /// Declared height.
    pub height: u32,
    /// Resolved warp parameters.
    pub params: WarpParams,
}

/// Successful worker result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSuccess {
    /// Generation of the request.
    pub generation: Generation,
    /// Output RGBA bytes.
    pub processed_buffer: Vec<u8>,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Time spent in the worker.
    pub elapsed_time_ms: f64,
}

/// Failed worker result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    /// Generation of the request.
    pub generation: Generation,
    /// Human-readable cause.
    pub error: String,
}

/// Response posted back by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    /// The warp completed.
    Success(WorkerSuccess),
    /// The warp failed.
    Failure(WorkerFailure),
}

impl WorkerResponse {
    /// Generation the response answers.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        match self {
            Self::Success(s) => s.generation,
            Self::Failure(f) => f.generation,
        }
    }
}

/// Worker-side handler: run the request and build the response.
///
/// Mismatched or empty buffers come back unchanged, as the local path
/// does; invalid parameters and panics become [`WorkerFailure`]s.
#[must_use]
pub fn handle_request(request: WorkerRequest) -> WorkerResponse {
    handle_request_with_model(request, &RegionModel::standard())
}

/// [`handle_request`] with a caller-supplied region model.
#[must_use]
pub fn handle_request_with_model(request: WorkerRequest, model: &RegionModel) -> WorkerResponse {
    let clock = WebClock;
    let started = clock.now();
    let WorkerRequest {
        command: Command::Process,
        generation,
        buffer,
        width,
        height,
        params,
    } = request;

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(move || {
        crate::process_buffer_with_model(width, height, buffer, &params, model)
    }))
    .map_err(|payload| crate::panic_message(payload.as_ref()));

    match outcome {
        Ok(Ok(processed_buffer)) => WorkerResponse::Success(WorkerSuccess {
            generation,
            processed_buffer,
            width,
            height,
            elapsed_time_ms: duration_ms(clock.since(started)),
        }),
        Ok(Err(e)) => WorkerResponse::Failure(WorkerFailure {
            generation,
            error: e.to_string(),
        }),
        Err(message) => WorkerResponse::Failure(WorkerFailure {
            generation,
            error: format!("warping panicked: {message}"),
        }),
    }
}
