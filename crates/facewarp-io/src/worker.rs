//! Web worker communication for off-main-thread warping.
//!
//! [`WarpWorker`] wraps a `web_sys::Worker` running the
//! `facewarp-worker` WASM module. It posts the source buffer and
//! resolved parameters, then races the worker's reply against a timer.
//! Replies for other generations are ignored.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use facewarp_pipeline::protocol::WorkerSuccess;
use facewarp_pipeline::{Generation, RgbaImage, WarpError, WarpParams};
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Value the timer resolves the race with.
const TIMED_OUT: &str = "facewarp:timeout";

/// A warp worker running in a dedicated web worker.
///
/// Create one per editor session and reuse it. After a timeout the
/// worker may still be busy with the abandoned request, so
/// [`restart`](Self::restart) it before the next run.
pub struct WarpWorker {
    script_url: String,
    inner: RefCell<web_sys::Worker>,
}

impl WarpWorker {
    /// Start a worker from the URL of its bootstrap script.
    ///
    /// Also installs the console log subscriber if none is set.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Worker`] if the browser refuses to create
    /// the worker.
    pub fn new(script_url: &str) -> Result<Self, WarpError> {
        crate::logging::init(crate::logging::DEFAULT_LOG_LEVEL);
        Ok(Self {
            script_url: script_url.to_owned(),
            inner: RefCell::new(create_worker(script_url)?),
        })
    }

    /// Terminate the current worker and start a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Worker`] if the new worker cannot be
    /// created. The old one is terminated either way.
    pub fn restart(&self) -> Result<(), WarpError> {
        self.inner.borrow().terminate();
        let fresh = create_worker(&self.script_url)?;
        *self.inner.borrow_mut() = fresh;
        Ok(())
    }

    /// Warp `source` in the worker, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Timeout`] if no reply for `generation`
    /// arrives in time, and [`WarpError::Worker`] if the worker reports
    /// an error, crashes, or replies with a malformed buffer.
    #[allow(clippy::future_not_send)] // WASM is single-threaded
    #[allow(clippy::cast_precision_loss)]
    pub async fn run(
        &self,
        generation: Generation,
        source: &RgbaImage,
        params: &WarpParams,
        timeout: Duration,
    ) -> Result<RgbaImage, WarpError> {
        let message = build_message(generation, source, params)?;
        let expected = generation.0 as f64;

        let reply = Rc::new(RefCell::new(None::<Result<WorkerSuccess, WarpError>>));
        let (reply_promise, resolve, reject) = new_promise()?;

        let reply_slot = Rc::clone(&reply);
        let onmessage = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                let data = event.data();
                let got = get(&data, "generation").and_then(|v| v.as_f64());
                if got.is_none_or(|g| (g - expected).abs() > f64::EPSILON) {
                    tracing::warn!(?got, expected, "ignoring stale worker message");
                    return;
                }
                *reply_slot.borrow_mut() = Some(read_reply(&data));
                let _ = resolve.call0(&JsValue::NULL);
            },
        );
        let onerror =
            Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(move |event: web_sys::ErrorEvent| {
                let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(&event.message()));
            });

        let (timer_promise, fire, _) = new_promise()?;
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let _timer = Timeout::new(millis, move || {
            let _ = fire.call1(&JsValue::NULL, &JsValue::from_str(TIMED_OUT));
        });

        {
            let worker = self.inner.borrow();
            worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
            worker.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            worker
                .post_message(&message)
                .map_err(|_| WarpError::Worker("failed to postMessage".into()))?;
        }

        let race = js_sys::Promise::race(&js_sys::Array::of2(&reply_promise, &timer_promise));
        let outcome = wasm_bindgen_futures::JsFuture::from(race).await;

        {
            let worker = self.inner.borrow();
            worker.set_onmessage(None);
            worker.set_onerror(None);
        }
        drop(onmessage);
        drop(onerror);

        match outcome {
            Ok(value) if value.as_string().as_deref() == Some(TIMED_OUT) => {
                Err(WarpError::Timeout(timeout))
            }
            Ok(_) => {
                let success = reply.borrow_mut().take().unwrap_or_else(|| {
                    Err(WarpError::Worker("worker finished without a reply".into()))
                })?;
                facewarp_pipeline::types::rgba_from_raw(
                    success.width,
                    success.height,
                    success.processed_buffer,
                )
                .map_err(|e| WarpError::Worker(e.to_string()))
            }
            Err(e) => Err(WarpError::Worker(
                e.as_string().unwrap_or_else(|| "unknown worker error".into()),
            )),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn build_message(
    generation: Generation,
    source: &RgbaImage,
    params: &WarpParams,
) -> Result<js_sys::Object, WarpError> {
    let params_json = serde_json::to_string(params)
        .map_err(|e| WarpError::InvalidConfig(format!("failed to serialize params: {e}")))?;

    let message = js_sys::Object::new();
    let fields: [(&str, JsValue); 6] = [
        ("command", JsValue::from_str("process")),
        ("generation", JsValue::from_f64(generation.0 as f64)),
        ("buffer", js_sys::Uint8Array::from(source.as_raw().as_slice()).into()),
        ("width", JsValue::from_f64(f64::from(source.width()))),
        ("height", JsValue::from_f64(f64::from(source.height()))),
        ("paramsJson", JsValue::from_str(&params_json)),
    ];
    for (key, value) in fields {
        js_sys::Reflect::set(&message, &JsValue::from_str(key), &value)
            .map_err(|_| WarpError::Worker(format!("failed to set {key}")))?;
    }
    Ok(message)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_reply(data: &JsValue) -> Result<WorkerSuccess, WarpError> {
    if let Some(error) = get(data, "error").and_then(|v| v.as_string()) {
        return Err(WarpError::Worker(error));
    }
    let number = |key: &str| get(data, key).and_then(|v| v.as_f64());
    let buffer = get(data, "processedBuffer")
        .and_then(|v| v.dyn_into::<js_sys::Uint8Array>().ok())
        .ok_or_else(|| WarpError::Worker("reply is missing processedBuffer".into()))?;
    let (Some(generation), Some(width), Some(height)) =
        (number("generation"), number("width"), number("height"))
    else {
        return Err(WarpError::Worker("reply is missing its dimensions".into()));
    };
    Ok(WorkerSuccess {
        generation: Generation(generation as u64),
        processed_buffer: buffer.to_vec(),
        width: width as u32,
        height: height as u32,
        elapsed_time_ms: number("elapsedTimeMs").unwrap_or_default(),
    })
}

fn get(data: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(data, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn create_worker(script_url: &str) -> Result<web_sys::Worker, WarpError> {
    web_sys::Worker::new(script_url).map_err(|e| {
        WarpError::Worker(format!(
            "failed to create worker from {script_url}: {}",
            e.as_string().unwrap_or_default()
        ))
    })
}

/// Create a JS Promise along with its resolve and reject functions.
fn new_promise() -> Result<(js_sys::Promise, js_sys::Function, js_sys::Function), WarpError> {
    let captured = Rc::new(RefCell::new(None::<(js_sys::Function, js_sys::Function)>));
    let slot = Rc::clone(&captured);
    let promise = js_sys::Promise::new(&mut move |resolve, reject| {
        *slot.borrow_mut() = Some((resolve, reject));
    });
    let (resolve, reject) = captured
        .borrow_mut()
        .take()
        .ok_or_else(|| WarpError::Worker("promise executor did not run".into()))?;
    Ok((promise, resolve, reject))
}
