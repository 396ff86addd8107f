//! Web worker entry point for facewarp processing.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives an RGBA buffer and resolved `WarpParams` via
//! `postMessage`, runs the warp with
//! `facewarp_pipeline::protocol::handle_request`, and posts the result
//! back.
//!
//! Pixel buffers travel as raw `Uint8Array`s. Only the small parameter
//! block is JSON.

use facewarp_pipeline::protocol::{
    Command, WorkerFailure, WorkerRequest, WorkerResponse, WorkerSuccess, handle_request,
};
use facewarp_pipeline::{Generation, WarpParams};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Message protocol: the main thread sends a JS object with:
/// - `command`: `"process"`
/// - `generation`: `f64` request counter (echoed in the response)
/// - `buffer`: `Uint8Array` of RGBA pixels
/// - `width`, `height`: `f64` buffer dimensions
/// - `paramsJson`: `String` containing JSON-serialized `WarpParams`
///
/// On success the worker responds with:
/// - `generation`, `width`, `height`, `elapsedTimeMs`: `f64`
/// - `processedBuffer`: `Uint8Array` of RGBA pixels
///
/// On failure it responds with:
/// - `generation`: `f64`
/// - `error`: `String`
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();
    facewarp_io::logging::init(facewarp_io::logging::DEFAULT_LOG_LEVEL);

    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope");

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // lives for the worker lifetime
}

fn handle_message(event: &web_sys::MessageEvent) {
    let data = event.data();
    let generation = get(&data, "generation")
        .ok()
        .and_then(|v| v.as_f64())
        .map_or(Generation(0), to_generation);

    let response = match read_request(&data, generation) {
        Ok(request) => handle_request(request),
        Err(error) => {
            tracing::warn!(%generation, %error, "rejecting malformed request");
            WorkerResponse::Failure(WorkerFailure { generation, error })
        }
    };
    post(&response);
}

fn read_request(data: &JsValue, generation: Generation) -> Result<WorkerRequest, String> {
    let command = get(data, "command")?
        .as_string()
        .ok_or("command is not a string")?;
    if command != "process" {
        return Err(format!("unknown command: {command}"));
    }

    let buffer: js_sys::Uint8Array = get(data, "buffer")?
        .dyn_into()
        .map_err(|_| "buffer is not a Uint8Array")?;
    let width = dimension(data, "width")?;
    let height = dimension(data, "height")?;

    let params_json = get(data, "paramsJson")?
        .as_string()
        .ok_or("paramsJson is not a string")?;
    let params: WarpParams = serde_json::from_str(&params_json)
        .map_err(|e| format!("failed to parse params: {e}"))?;

    Ok(WorkerRequest {
        command: Command::Process,
        generation,
        buffer: buffer.to_vec(),
        width,
        height,
        params,
    })
}

fn get(data: &JsValue, key: &str) -> Result<JsValue, String> {
    js_sys::Reflect::get(data, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined())
        .ok_or_else(|| format!("missing {key} field"))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dimension(data: &JsValue, key: &str) -> Result<u32, String> {
    let value = get(data, key)?
        .as_f64()
        .ok_or_else(|| format!("{key} is not a number"))?;
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(format!("{key} is out of range: {value}"));
    }
    Ok(value as u32)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_generation(value: f64) -> Generation {
    Generation(value.max(0.0) as u64)
}

#[allow(clippy::cast_precision_loss)]
fn post(response: &WorkerResponse) {
    let object = js_sys::Object::new();
    let set = |key: &str, val: &JsValue| {
        let _ = js_sys::Reflect::set(&object, &JsValue::from_str(key), val);
    };

    match response {
        WorkerResponse::Success(WorkerSuccess {
            generation,
            processed_buffer,
            width,
            height,
            elapsed_time_ms,
        }) => {
            set("generation", &JsValue::from_f64(generation.0 as f64));
            set(
                "processedBuffer",
                &js_sys::Uint8Array::from(processed_buffer.as_slice()),
            );
            set("width", &JsValue::from_f64(f64::from(*width)));
            set("height", &JsValue::from_f64(f64::from(*height)));
            set("elapsedTimeMs", &JsValue::from_f64(*elapsed_time_ms));
        }
        WorkerResponse::Failure(WorkerFailure { generation, error }) => {
            set("generation", &JsValue::from_f64(generation.0 as f64));
            set("error", &JsValue::from_str(error));
        }
    }

    if let Ok(global) = js_sys::global().dyn_into::<web_sys::DedicatedWorkerGlobalScope>() {
        let _ = global.post_message(&object);
    }
}
