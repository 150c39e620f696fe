//! Runtime-agnostic task spawning
//!
//! The lease drain task and per-connection server loops have to run
//! somewhere, but this crate does not pick an executor. Spawning goes
//! through the [`Spawner`] trait; implementations for smol, tokio and
//! async-std are feature-gated, and [`default_spawner`] selects one at
//! compile time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A spawner that can run futures in the background on some async runtime
pub trait Spawner: Send + Sync {
    /// Spawn a future; it runs to completion (or until dropped by the
    /// runtime) in the background.
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>);
}

/// Spawner backed by the smol global executor
#[cfg(feature = "smol")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

#[cfg(feature = "smol")]
impl Spawner for SmolSpawner {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) {
        smol::spawn(future).detach();
    }
}

/// Spawner backed by the current tokio runtime
///
/// Panics if used outside a tokio runtime context, as `tokio::spawn` does.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[cfg(feature = "tokio")]
impl Spawner for TokioSpawner {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) {
        tokio::spawn(future);
    }
}

/// Spawner backed by the async-std global executor
#[cfg(feature = "async-std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncStdSpawner;

#[cfg(feature = "async-std")]
impl Spawner for AsyncStdSpawner {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) {
        async_std::task::spawn(future);
    }
}

/// The spawner selected by compile-time runtime features.
///
/// Preference order when several runtime features are enabled:
/// smol, tokio, async-std.
pub fn default_spawner() -> Arc<dyn Spawner> {
    #[cfg(feature = "smol")]
    return Arc::new(SmolSpawner);

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    return Arc::new(TokioSpawner);

    #[cfg(all(
        feature = "async-std",
        not(any(feature = "smol", feature = "tokio"))
    ))]
    return Arc::new(AsyncStdSpawner);

    #[cfg(not(any(feature = "smol", feature = "tokio", feature = "async-std")))]
    compile_error!("one of the runtime features must be enabled: smol, tokio, or async-std");
}
