//! facewarp-io: Browser host glue for the warping engine.
//!
//! Delegates warps to a web worker with a timeout, falls back to
//! cooperative chunked processing on the main thread, and keeps stale
//! results out of the session. Log events go to the browser console
//! (see [`logging`]).

pub mod logging;
pub mod runner;
pub mod worker;

use std::future::Future;
use std::time::Duration;

use facewarp_pipeline::{Generation, RgbaImage, WarpError, WarpParams, WarpSession};

pub use runner::{run_chunked, yield_to_browser};
pub use worker::WarpWorker;

/// Outcome of one [`process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The result was committed to the session.
    Committed(Generation),
    /// A newer request superseded this one; nothing was committed.
    Superseded(Generation),
}

/// Warp `source` for a new session generation.
///
/// Tries `worker` first (if any) with `timeout`. Any worker failure,
/// including a timeout, is logged and recovered by running the chunked
/// path on this thread with the same inputs. The result is committed to
/// `session` only if no newer request started in the meantime.
///
/// # Errors
///
/// Returns an error only if the local fallback fails as well.
#[allow(clippy::future_not_send)]
#[tracing::instrument(skip_all, fields(width = source.width(), height = source.height()))]
pub async fn process(
    worker: Option<&WarpWorker>,
    session: &WarpSession,
    source: &RgbaImage,
    params: &WarpParams,
    timeout: Duration,
) -> Result<Outcome, WarpError> {
    logging::init(logging::DEFAULT_LOG_LEVEL);
    let generation = session.begin();
    process_generation(
        session,
        generation,
        source,
        params,
        async {
            match worker {
                Some(worker) => {
                    let result = worker.run(generation, source, params, timeout).await;
                    if matches!(result, Err(WarpError::Timeout(_))) {
                        // The abandoned request may still be running.
                        if let Err(e) = worker.restart() {
                            tracing::warn!(error = %e, "failed to restart worker");
                        }
                    }
                    result
                }
                None => Err(WarpError::Worker("no worker available".into())),
            }
        },
        yield_to_browser,
    )
    .await
}

/// [`process`] with the delegated attempt and the yield supplied by
/// the caller.
///
/// # Errors
///
/// Returns an error only if the local fallback fails as well.
#[allow(clippy::future_not_send)]
pub async fn process_generation<D, Y, F>(
    session: &WarpSession,
    generation: Generation,
    source: &RgbaImage,
    params: &WarpParams,
    delegated: D,
    yield_now: Y,
) -> Result<Outcome, WarpError>
where
    D: Future<Output = Result<RgbaImage, WarpError>>,
    Y: FnMut() -> F,
    F: Future<Output = ()>,
{
    let image = match delegated.await {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(
                %generation,
                error = %e,
                "worker failed, falling back to chunked processing",
            );
            match run_chunked(session, generation, source, params, yield_now).await? {
                Some(finished) => finished.into_image(),
                None => return Ok(Outcome::Superseded(generation)),
            }
        }
    };

    if session.commit(generation, image) {
        Ok(Outcome::Committed(generation))
    } else {
        Ok(Outcome::Superseded(generation))
    }
}
