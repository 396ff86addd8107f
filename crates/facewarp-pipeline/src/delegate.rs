//! Delegating a whole warp to an independent worker, with a bounded
//! wait and a local fallback.
//!
//! [`ThreadWorker`] is the native implementation: a dedicated thread
//! fed over `std::sync::mpsc` channels. The browser implementation
//! lives in the IO crate and speaks the same [`WorkerRequest`] /
//! [`WorkerResponse`] messages.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use web_time::Instant;

use crate::params::WarpParams;
use crate::protocol::{Command, WorkerRequest, WorkerResponse, WorkerSuccess, handle_request};
use crate::region::RegionModel;
use crate::session::Generation;
use crate::types::{RgbaImage, WarpError, rgba_from_raw};

/// Something that can run a [`WorkerRequest`] to completion.
pub trait Delegate {
    /// Submit `request` and wait at most `timeout` for its answer.
    ///
    /// Responses to other generations are discarded while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Timeout`] if no matching response arrived in
    /// time, or [`WarpError::Worker`] if the worker reported a failure
    /// or is gone.
    fn run(&mut self, request: WorkerRequest, timeout: Duration)
    -> Result<WorkerSuccess, WarpError>;
}

/// Shared request handler run on the worker thread.
pub type Handler = Arc<dyn Fn(WorkerRequest) -> WorkerResponse + Send + Sync>;

/// Worker backed by a dedicated OS thread.
///
/// The thread exits when the `ThreadWorker` is dropped or restarted. A
/// request that is still running at that point finishes, and its
/// response is discarded.
pub struct ThreadWorker {
    handler: Handler,
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
}

impl std::fmt::Debug for ThreadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadWorker").finish_non_exhaustive()
    }
}

impl ThreadWorker {
    /// Spawn a worker running [`handle_request`].
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Worker`] if the thread cannot be spawned.
    pub fn spawn() -> Result<Self, WarpError> {
        Self::with_handler(Arc::new(handle_request))
    }

    /// Spawn a worker running a custom handler.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Worker`] if the thread cannot be spawned.
    pub fn with_handler(handler: Handler) -> Result<Self, WarpError> {
        let (requests, responses) = start_thread(Arc::clone(&handler))?;
        Ok(Self {
            handler,
            requests,
            responses,
        })
    }

    /// Abandon the current thread, along with anything queued on it,
    /// and start a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Worker`] if the new thread cannot be
    /// spawned.
    pub fn restart(&mut self) -> Result<(), WarpError> {
        let (requests, responses) = start_thread(Arc::clone(&self.handler))?;
        self.requests = requests;
        self.responses = responses;
        Ok(())
    }

    fn wait(&self, generation: Generation, timeout: Duration) -> Result<WorkerSuccess, WarpError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok(response) if response.generation() != generation => {
                    tracing::warn!(
                        stale = %response.generation(),
                        expected = %generation,
                        "discarding stale worker response",
                    );
                }
                Ok(WorkerResponse::Success(success)) => return Ok(success),
                Ok(WorkerResponse::Failure(failure)) => {
                    return Err(WarpError::Worker(failure.error));
                }
                Err(RecvTimeoutError::Timeout) => return Err(WarpError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(WarpError::Worker("worker thread has exited".into()));
                }
            }
        }
    }
}

/// Spawn the worker thread and return its channel ends.
///
/// The thread stops once its request sender is dropped or its response
/// receiver is gone.
fn start_thread(
    handler: Handler,
) -> Result<(Sender<WorkerRequest>, Receiver<WorkerResponse>), WarpError> {
    let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
    let (response_tx, response_rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("facewarp-worker".into())
        .spawn(move || {
            for request in request_rx {
                if response_tx.send(handler(request)).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| WarpError::Worker(format!("failed to spawn worker thread: {e}")))?;
    Ok((request_tx, response_rx))
}

impl Delegate for ThreadWorker {
    fn run(
        &mut self,
        request: WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerSuccess, WarpError> {
        let generation = request.generation;
        self.requests
            .send(request)
            .map_err(|_| WarpError::Worker("worker thread has exited".into()))?;

        let result = self.wait(generation, timeout);
        if matches!(result, Err(WarpError::Timeout(_))) {
            // The abandoned request would delay every later one.
            if let Err(e) = self.restart() {
                tracing::warn!(error = %e, "failed to restart worker thread");
            }
        }
        result
    }
}

/// Build the request for `source`.
#[must_use]
pub fn build_request(
    generation: Generation,
    source: &RgbaImage,
    params: &WarpParams,
) -> WorkerRequest {
    WorkerRequest {
        command: Command::Process,
        generation,
        buffer: source.as_raw().clone(),
        width: source.width(),
        height: source.height(),
        params: params.clone(),
    }
}

/// Warp `source` on `delegate`, falling back to the local chunked path
/// if the worker times out, fails, or returns a buffer that does not
/// match `source`.
///
/// # Errors
///
/// Returns an error only if the local fallback fails too.
#[tracing::instrument(skip_all, fields(%generation))]
pub fn process_with_fallback<D: Delegate + ?Sized>(
    delegate: &mut D,
    generation: Generation,
    source: &RgbaImage,
    params: &WarpParams,
    timeout: Duration,
) -> Result<RgbaImage, WarpError> {
    let delegated = delegate
        .run(build_request(generation, source, params), timeout)
        .and_then(|success| {
            if (success.width, success.height) != source.dimensions() {
                return Err(WarpError::Worker(format!(
                    "worker replied with {}x{}, expected {}x{}",
                    success.width,
                    success.height,
                    source.width(),
                    source.height(),
                )));
            }
            rgba_from_raw(success.width, success.height, success.processed_buffer)
        });

    match delegated {
        Ok(image) => Ok(image),
        Err(e) => {
            tracing::warn!(error = %e, "worker failed, falling back to local processing");
            let model = RegionModel::standard();
            Ok(crate::process_local(source, params, &model)?.into_image())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::effect::EffectOptions;
    use crate::protocol::WorkerFailure;
    use crate::types::{Dimensions, FaceBox, Feature, SliderMap, WarpConfig};

    fn source() -> RgbaImage {
        RgbaImage::from_fn(40, 40, |x, y| {
            image::Rgba([(x * 6) as u8, (y * 6) as u8, 77, 255])
        })
    }

    fn params(img: &RgbaImage) -> WarpParams {
        WarpParams::resolve(
            Some(&FaceBox::new(0.0, 0.0, 40.0, 40.0)),
            Dimensions::of(img),
            &SliderMap::new().with(Feature::EyeSize, 70.0),
            &EffectOptions::none(),
            &WarpConfig::default(),
        )
    }

    fn local(img: &RgbaImage, params: &WarpParams) -> RgbaImage {
        crate::process_local(img, params, &RegionModel::standard())
            .unwrap()
            .into_image()
    }

    #[test]
    fn thread_worker_matches_local_path() {
        let img = source();
        let params = params(&img);
        let mut worker = ThreadWorker::spawn().unwrap();
        let out = process_with_fallback(
            &mut worker,
            Generation(1),
            &img,
            &params,
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(out, local(&img, &params));
    }

    #[test]
    fn timeout_falls_back_to_local() {
        let img = source();
        let params = params(&img);
        let mut worker = ThreadWorker::with_handler(Arc::new(|request| {
            std::thread::sleep(Duration::from_millis(300));
            handle_request(request)
        }))
        .unwrap();
        let err = worker
            .run(build_request(Generation(1), &img, &params), Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, WarpError::Timeout(_)));

        let out = process_with_fallback(
            &mut worker,
            Generation(2),
            &img,
            &params,
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(out, local(&img, &params));
    }

    #[test]
    fn worker_error_falls_back_to_local() {
        let img = source();
        let params = params(&img);
        let mut worker = ThreadWorker::with_handler(Arc::new(|request| {
            WorkerResponse::Failure(WorkerFailure {
                generation: request.generation,
                error: "out of memory".into(),
            })
        }))
        .unwrap();
        let out = process_with_fallback(
            &mut worker,
            Generation(5),
            &img,
            &params,
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(out, local(&img, &params));
    }

    #[test]
    fn stale_responses_are_ignored() {
        let img = source();
        let params = params(&img);
        // Answers every request twice: once for an older generation,
        // then for the real one.
        let (tx, rx) = mpsc::channel::<WorkerRequest>();
        let (resp_tx, resp_rx) = mpsc::channel();
        std::thread::spawn(move || {
            for request in rx {
                let stale = WorkerResponse::Failure(WorkerFailure {
                    generation: Generation(request.generation.0 - 1),
                    error: "stale".into(),
                });
                resp_tx.send(stale).unwrap();
                resp_tx.send(handle_request(request)).unwrap();
            }
        });
        let mut worker = ThreadWorker {
            handler: Arc::new(handle_request),
            requests: tx,
            responses: resp_rx,
        };
        let success = worker
            .run(build_request(Generation(8), &img, &params), Duration::from_secs(30))
            .unwrap();
        assert_eq!(success.generation, Generation(8));
    }

    #[test]
    fn malformed_buffer_falls_back_to_local() {
        let img = source();
        let params = params(&img);
        let mut worker = ThreadWorker::with_handler(Arc::new(|request| {
            WorkerResponse::Success(WorkerSuccess {
                generation: request.generation,
                processed_buffer: vec![0; 3],
                width: request.width,
                height: request.height,
                elapsed_time_ms: 0.0,
            })
        }))
        .unwrap();
        let out = process_with_fallback(
            &mut worker,
            Generation(1),
            &img,
            &params,
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(out, local(&img, &params));
    }

    #[test]
    fn worker_recovers_after_timeouts() {
        let img = source();
        let params = params(&img);
        let mut worker = ThreadWorker::with_handler(Arc::new(|request| {
            std::thread::sleep(Duration::from_millis(200));
            handle_request(request)
        }))
        .unwrap();
        for generation in 1..=3 {
            let err = worker
                .run(
                    build_request(Generation(generation), &img, &params),
                    Duration::from_millis(20),
                )
                .unwrap_err();
            assert!(matches!(err, WarpError::Timeout(_)));
        }

        // Enough time for one job; nothing stale is queued ahead of it.
        let success = worker
            .run(build_request(Generation(4), &img, &params), Duration::from_secs(10))
            .unwrap();
        assert_eq!(success.generation, Generation(4));
        assert_eq!(success.processed_buffer, local(&img, &params).into_raw());
    }

    #[test]
    fn reply_with_wrong_dimensions_falls_back_to_local() {
        let img = source();
        let params = params(&img);
        // Self-consistent buffer, but transposed against the source.
        let mut worker = ThreadWorker::with_handler(Arc::new(|request| {
            WorkerResponse::Success(WorkerSuccess {
                generation: request.generation,
                processed_buffer: vec![0; 20 * 80 * 4],
                width: 20,
                height: 80,
                elapsed_time_ms: 0.0,
            })
        }))
        .unwrap();
        let out = process_with_fallback(
            &mut worker,
            Generation(2),
            &img,
            &params,
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(out, local(&img, &params));
    }
}
