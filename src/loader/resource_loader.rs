// ABOUTME: Idempotent, network-aware loading of the terminal rendering capability
// Memoizes one in-flight load per capability and degrades gracefully on slow networks

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::hints::{DeviceHint, NetworkHint};

/// Base retry delay on a slow connection.
pub const SLOW_RETRY_BASE_DELAY: Duration = Duration::from_millis(300);
/// Base retry delay otherwise.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Extra attempts granted when the connection is slow and the device mobile.
pub const SLOW_MOBILE_EXTRA_ATTEMPTS: u32 = 2;

const PRELOAD_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Host-supplied source of the rendering capability modules.
///
/// `fetch_core` and `fetch_acceleration` are invoked at most once per
/// in-flight load window; the loader owns all caching and retry.
pub trait CapabilityFetcher: Send + Sync + 'static {
    type Core: Clone + Send + Sync + 'static;
    type Accel: Clone + Send + Sync + 'static;

    fn fetch_core(&self) -> BoxFuture<'static, anyhow::Result<Self::Core>>;
    fn fetch_acceleration(&self) -> BoxFuture<'static, anyhow::Result<Self::Accel>>;
}

/// Cloneable load failure shared by every caller of the same in-flight load.
#[derive(Debug, Clone)]
pub struct LoadError(Arc<anyhow::Error>);

impl LoadError {
    fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capability load failed: {:#}", self.0)
    }
}

impl std::error::Error for LoadError {}

/// Read-only diagnostic snapshot for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingInfo {
    pub is_mobile: bool,
    pub is_slow_connection: bool,
    pub is_loaded: bool,
}

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;
type CacheSlot<T> = Arc<Mutex<Option<SharedLoad<T>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ResourceLoader<F: CapabilityFetcher> {
    fetcher: Arc<F>,
    network: NetworkHint,
    device: DeviceHint,
    core: CacheSlot<F::Core>,
    accel: CacheSlot<F::Accel>,
}

impl<F: CapabilityFetcher> Clone for ResourceLoader<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            network: self.network.clone(),
            device: self.device,
            core: Arc::clone(&self.core),
            accel: Arc::clone(&self.accel),
        }
    }
}

impl<F: CapabilityFetcher> ResourceLoader<F> {
    pub fn new(fetcher: F, network: NetworkHint, device: DeviceHint) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            network,
            device,
            core: Arc::new(Mutex::new(None)),
            accel: Arc::new(Mutex::new(None)),
        }
    }

    /// Load the core rendering capability.
    ///
    /// Concurrent callers share a single underlying fetch. A failed load
    /// clears the cache so the next call retries fresh; a successful load
    /// is cached for the lifetime of the process.
    pub async fn load_core(&self) -> Result<F::Core, LoadError> {
        let fetcher = Arc::clone(&self.fetcher);
        load_with_cache(&self.core, move || fetcher.fetch_core()).await
    }

    /// Load the optional acceleration capability. Same caching contract as
    /// [`load_core`](Self::load_core); failures here never block the core.
    pub async fn load_acceleration(&self) -> Result<F::Accel, LoadError> {
        let fetcher = Arc::clone(&self.fetcher);
        load_with_cache(&self.accel, move || fetcher.fetch_acceleration()).await
    }

    /// Warm the cache speculatively. Fire-and-forget: failures are logged
    /// and swallowed. Acceleration is skipped on slow connections.
    pub fn preload(&self) {
        let loader = self.clone();
        tokio::spawn(async move {
            if loader.load_core().await.is_err() {
                // One retry, then leave recovery to the on-demand path.
                sleep(PRELOAD_RETRY_DELAY).await;
                if let Err(err) = loader.load_core().await {
                    debug!("core capability preload failed: {err}");
                }
            }
        });

        if !self.network.is_slow() {
            let loader = self.clone();
            tokio::spawn(async move {
                if let Err(err) = loader.load_acceleration().await {
                    debug!("acceleration preload failed: {err}");
                }
            });
        }
    }

    /// Preload with bounded exponential backoff.
    ///
    /// Delay before retry *n* is `base * 2^(n-1)`; the base is shorter on
    /// slow connections and the attempt budget grows by
    /// [`SLOW_MOBILE_EXTRA_ATTEMPTS`] when the connection is slow and the
    /// device mobile. Exhaustion is logged, never raised: the on-demand
    /// load path stays the recovery mechanism.
    pub async fn preload_with_retry(&self, max_retries: u32) {
        let slow = self.network.is_slow();
        let mobile = self.device.is_mobile;
        let max_attempts = if slow && mobile {
            max_retries + SLOW_MOBILE_EXTRA_ATTEMPTS
        } else {
            max_retries
        };
        let base_delay = if slow {
            SLOW_RETRY_BASE_DELAY
        } else {
            RETRY_BASE_DELAY
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.load_core().await {
                Ok(_) => {
                    if !slow {
                        let loader = self.clone();
                        tokio::spawn(async move {
                            let _ = loader.load_acceleration().await;
                        });
                    }
                    return;
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        warn!("capability preload failed after {attempt} attempts: {err}");
                        return;
                    }
                    let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                    debug!("capability preload attempt {attempt} failed, retrying in {delay:?}");
                    sleep(delay).await;
                }
            }
        }
    }

    /// Whether a core load has been started (pending or resolved).
    pub fn is_loaded(&self) -> bool {
        lock(&self.core).is_some()
    }

    pub fn loading_info(&self) -> LoadingInfo {
        LoadingInfo {
            is_mobile: self.device.is_mobile,
            is_slow_connection: self.network.is_slow(),
            is_loaded: self.is_loaded(),
        }
    }
}

async fn load_with_cache<T, M>(slot: &CacheSlot<T>, make: M) -> Result<T, LoadError>
where
    T: Clone + Send + Sync + 'static,
    M: FnOnce() -> BoxFuture<'static, anyhow::Result<T>>,
{
    let shared = {
        let mut guard = lock(slot);
        if let Some(existing) = guard.as_ref() {
            existing.clone()
        } else {
            let fetch = make();
            let cache = Arc::clone(slot);
            let load = async move {
                match fetch.await {
                    Ok(handle) => Ok(handle),
                    Err(err) => {
                        // Clear before the rejection reaches any waiter.
                        *lock(&cache) = None;
                        Err(LoadError::new(err))
                    }
                }
            }
            .boxed()
            .shared();
            *guard = Some(load.clone());
            load
        }
    };

    shared.await
}
