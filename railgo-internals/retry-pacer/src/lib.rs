//! Railgo Retry Pacer
//! Copyright (c) 2026 Railgo Contributors
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! railgo-internals/retry-pacer
//! Gamma-jittered pacing and cooperative abort for polling loops against external services

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time;

/// Custom error for the pacer
#[derive(Debug, Error)]
pub enum PacerError {
    #[error("polling loop aborted")]
    Aborted,
}

/// Sender half of a cooperative abort pair. Cloneable; any clone can abort.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    inner: Arc<AbortInner>,
}

/// Receiver half of a cooperative abort pair, held by the polling loop.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

#[derive(Debug)]
struct AbortInner {
    aborted: AtomicBool,
    notify: Notify,
}

/// Create a connected (handle, signal) abort pair.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let inner = Arc::new(AbortInner {
        aborted: AtomicBool::new(false),
        notify: Notify::new(),
    });
    (
        AbortHandle {
            inner: Arc::clone(&inner),
        },
        AbortSignal { inner },
    )
}

impl AbortHandle {
    /// Request the loop to stop. Takes effect at the next pause boundary,
    /// never mid-call.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// A signal that never fires, for loops driven to completion.
    pub fn never() -> Self {
        abort_pair().1
    }

    async fn wait_aborted(&self) {
        while !self.is_aborted() {
            self.inner.notify.notified().await;
        }
    }
}

/// Samples inter-attempt delays from a Gamma distribution with integer shape
/// (an Erlang distribution: the sum of `shape` exponentials with the given
/// scale). Randomized spacing keeps a polling loop from emitting a
/// fixed-interval request fingerprint.
///
/// # Examples
///
/// Mean delay of one second (4 x 250 ms):
/// ```ignore
/// let pacer = GammaPacer::new(4, Duration::from_millis(250));
/// pacer.pause(&abort).await?;
/// ```
#[derive(Clone, Debug)]
pub struct GammaPacer {
    shape: u32,
    scale: Duration,
}

impl Default for GammaPacer {
    fn default() -> Self {
        Self {
            shape: 4,
            scale: Duration::from_millis(250),
        }
    }
}

impl GammaPacer {
    /// Create a pacer with the given shape and scale. Shape is clamped to at
    /// least 1 so every sample is a positive delay.
    pub fn new(shape: u32, scale: Duration) -> Self {
        Self {
            shape: shape.max(1),
            scale,
        }
    }

    /// Mean of the sampled distribution (shape * scale).
    pub fn mean(&self) -> Duration {
        self.scale * self.shape
    }

    /// Draw one delay. Erlang sampling: -scale * ln(U1 * ... * Uk).
    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        let mut log_product = 0.0_f64;
        for _ in 0..self.shape {
            let u: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
            log_product += u.ln();
        }
        self.scale.mul_f64(-log_product)
    }

    /// Sleep for one sampled delay, waking early if the abort signal fires.
    pub async fn pause(&self, abort: &AbortSignal) -> Result<(), PacerError> {
        if abort.is_aborted() {
            return Err(PacerError::Aborted);
        }
        let delay = self.sample(&mut rand::thread_rng());
        tokio::select! {
            _ = time::sleep(delay) => Ok(()),
            _ = abort.wait_aborted() => Err(PacerError::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_are_positive_and_finite() {
        let pacer = GammaPacer::new(4, Duration::from_millis(250));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let d = pacer.sample(&mut rng);
            assert!(d > Duration::ZERO);
            assert!(d < Duration::from_secs(60), "implausibly long draw: {d:?}");
        }
    }

    #[test]
    fn sample_mean_tracks_shape_times_scale() {
        let pacer = GammaPacer::new(4, Duration::from_millis(250));
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| pacer.sample(&mut rng).as_secs_f64()).sum();
        let mean = total / n as f64;
        // Erlang(4, 0.25s) has mean 1.0s and sd 0.5s; 20k draws put the
        // sample mean within a few milliseconds of that.
        assert!((mean - 1.0).abs() < 0.05, "sample mean {mean} drifted");
    }

    #[test]
    fn zero_shape_is_clamped() {
        let pacer = GammaPacer::new(0, Duration::from_millis(100));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pacer.sample(&mut rng) > Duration::ZERO);
        assert_eq!(pacer.mean(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn pause_returns_after_delay() {
        let pacer = GammaPacer::new(1, Duration::from_millis(1));
        let (_handle, signal) = abort_pair();
        pacer.pause(&signal).await.expect("pause completes");
    }

    #[tokio::test]
    async fn abort_interrupts_pause() {
        let pacer = GammaPacer::new(4, Duration::from_secs(60));
        let (handle, signal) = abort_pair();
        let sleeper = tokio::spawn(async move { pacer.pause(&signal).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        let res = sleeper.await.expect("task joins");
        assert!(matches!(res, Err(PacerError::Aborted)));
    }

    #[tokio::test]
    async fn aborted_signal_fails_fast() {
        let pacer = GammaPacer::default();
        let (handle, signal) = abort_pair();
        handle.abort();
        assert!(matches!(pacer.pause(&signal).await, Err(PacerError::Aborted)));
    }
}
