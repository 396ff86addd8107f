//! Generation tracking for one editing session.
//!
//! Every request gets a fresh [`Generation`] from
//! [`WarpSession::begin`]. A finished result is kept only if its
//! generation is still the latest one requested when it completes, so a
//! slow stale job can never overwrite the output of a newer request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::types::RgbaImage;

/// Monotonic request identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Latest requested generation plus the latest accepted result.
#[derive(Debug, Default)]
pub struct WarpSession {
    latest: AtomicU64,
    committed: Mutex<Option<(Generation, RgbaImage)>>,
}

impl WarpSession {
    /// New session with no requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every earlier one.
    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently started generation.
    #[must_use]
    pub fn latest(&self) -> Generation {
        Generation(self.latest.load(Ordering::SeqCst))
    }

    /// Whether `generation` is still the latest request.
    ///
    /// Chunked runs check this between slices and stop early once
    /// superseded.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest() == generation
    }

    /// Store `image` as the session output if `generation` is still the
    /// latest request. Returns `false` and drops the image otherwise.
    pub fn commit(&self, generation: Generation, image: RgbaImage) -> bool {
        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current(generation)
            || committed.as_ref().is_some_and(|(g, _)| *g > generation)
        {
            tracing::warn!(%generation, latest = %self.latest(), "discarding stale warp result");
            return false;
        }
        *committed = Some((generation, image));
        true
    }

    /// The last accepted result.
    #[must_use]
    pub fn output(&self) -> Option<(Generation, RgbaImage)> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the last accepted result.
    pub fn take(&self) -> Option<(Generation, RgbaImage)> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
