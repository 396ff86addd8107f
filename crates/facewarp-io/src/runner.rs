//! Cooperative chunked warping on the browser's main thread.
//!
//! Runs a [`WarpJob`] one slice at a time and awaits `yield_now`
//! between slices so input events and rendering get a turn. After
//! every yield the run checks that its generation is still the latest
//! one in the [`WarpSession`]; a superseded run stops without applying
//! its effect.

use std::future::Future;

use facewarp_pipeline::{
    Finished, Generation, RegionModel, RgbaImage, WarpError, WarpJob, WarpParams, WarpSession,
};
use gloo_timers::future::TimeoutFuture;

/// Give control back to the browser event loop for one turn.
pub async fn yield_to_browser() {
    TimeoutFuture::new(0).await;
}

/// Warp `source` slice by slice.
///
/// Returns `Ok(None)` if `generation` was superseded before the last
/// slice finished.
///
/// # Errors
///
/// Returns [`WarpError::InvalidConfig`] if `params` are invalid.
#[allow(clippy::future_not_send)]
pub async fn run_chunked<Y, F>(
    session: &WarpSession,
    generation: Generation,
    source: &RgbaImage,
    params: &WarpParams,
    mut yield_now: Y,
) -> Result<Option<Finished>, WarpError>
where
    Y: FnMut() -> F,
    F: Future<Output = ()>,
{
    let model = RegionModel::standard();
    let mut warping = WarpJob::new(source, params, &model).prepare()?;
    let slices = warping.slice_count();

    while let Some(progress) = warping.step() {
        if progress.index + 1 < slices {
            yield_now().await;
            if !session.is_current(generation) {
                tracing::debug!(
                    %generation,
                    completed = progress.completed_rows,
                    total = progress.total_rows,
                    "abandoning superseded warp",
                );
                return Ok(None);
            }
        }
    }
    Ok(Some(warping.finish().apply_effect()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use std::cell::Cell;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use facewarp_pipeline::{Dimensions, EffectOptions, FaceBox, Feature, SliderMap, WarpConfig};

    use super::*;

    /// Poll a future that never actually waits.
    fn block_on<T>(future: impl Future<Output = T>) -> T {
        let mut cx = Context::from_waker(Waker::noop());
        match pin!(future).poll(&mut cx) {
            Poll::Ready(value) => value,
            Poll::Pending => unreachable!("future should complete immediately"),
        }
    }

    fn setup() -> (RgbaImage, WarpParams) {
        let img = RgbaImage::from_fn(64, 64, |x, y| [(x * 4) as u8, (y * 4) as u8, 0, 255].into());
        let mut params = WarpParams::resolve(
            Some(&FaceBox::new(0.0, 0.0, 64.0, 64.0)),
            Dimensions::of(&img),
            &SliderMap::new().with(Feature::FaceWidth, 90.0),
            &EffectOptions::none(),
            &WarpConfig::default(),
        );
        params.slice_rows = 16;
        (img, params)
    }

    #[test]
    fn completes_and_matches_local_path() {
        let (img, params) = setup();
        let session = WarpSession::new();
        let generation = session.begin();
        let yields = Cell::new(0);
        let finished = block_on(run_chunked(&session, generation, &img, &params, || {
            yields.set(yields.get() + 1);
            std::future::ready(())
        }))
        .unwrap()
        .unwrap();

        assert_eq!(yields.get(), 3);
        let local = facewarp_pipeline::process_local(&img, &params, &RegionModel::standard())
            .unwrap();
        assert_eq!(finished.image(), local.image());
    }

    #[test]
    fn superseded_run_stops_early() {
        let (img, params) = setup();
        let session = WarpSession::new();
        let generation = session.begin();
        let yields = Cell::new(0);
        let outcome = block_on(run_chunked(&session, generation, &img, &params, || {
            yields.set(yields.get() + 1);
            // A newer request arrives while this one is yielding.
            session.begin();
            std::future::ready(())
        }))
        .unwrap();
        assert!(outcome.is_none());
        assert_eq!(yields.get(), 1);
    }
}
