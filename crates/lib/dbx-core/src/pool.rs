use std::future::Future;
use std::pin::Pin;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::capability::{ClientSource, Probe};
use crate::error::ToolError;

pub type BuildClientFuture<T> =
    Pin<Box<dyn Future<Output = Result<Arc<T>, ToolError>> + Send + 'static>>;
pub type BuildClientFn<T> = Arc<dyn Fn() -> BuildClientFuture<T> + Send + Sync + 'static>;

/// Configuration for a lazily built, health-checked client.
pub struct ClientPoolConfig<T: ?Sized> {
    pub ttl: Option<Duration>,
    pub sweep_interval: Duration,
    /// Clients idle for longer than this are pinged before being handed out.
    pub health_check_after: Duration,
    pub build_client: BuildClientFn<T>,
}

impl<T: ?Sized> Clone for ClientPoolConfig<T> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            sweep_interval: self.sweep_interval,
            health_check_after: self.health_check_after,
            build_client: self.build_client.clone(),
        }
    }
}

impl<T: ?Sized> ClientPoolConfig<T> {
    pub fn new(build_client: BuildClientFn<T>) -> Self {
        Self {
            ttl: None,
            sweep_interval: Duration::from_secs(60),
            health_check_after: Duration::from_secs(300),
            build_client,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    #[must_use]
    pub const fn with_health_check_after(mut self, health_check_after: Duration) -> Self {
        self.health_check_after = health_check_after;
        self
    }
}

/// One shared client per capability, created on first use.
///
/// A client that has gone unverified for longer than
/// [`ClientPoolConfig::health_check_after`] is pinged before it is returned and
/// rebuilt when the ping fails. Build failures are not cached.
pub struct ClientPool<T: ?Sized> {
    inner: Arc<ClientPoolInner<T>>,
}

impl<T: ?Sized> Clone for ClientPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ClientPoolInner<T: ?Sized> {
    name: String,
    slot: RwLock<Option<Arc<PooledClient<T>>>>,
    config: ClientPoolConfig<T>,
}

struct PooledClient<T: ?Sized> {
    client: Arc<T>,
    last_used_ms: AtomicU64,
    last_verified_ms: AtomicU64,
}

impl<T: ?Sized> PooledClient<T> {
    fn new(client: Arc<T>) -> Self {
        let now = now_ms();
        Self {
            client,
            last_used_ms: AtomicU64::new(now),
            last_verified_ms: AtomicU64::new(now),
        }
    }

    fn touch(&self) {
        self.last_used_ms.store(now_ms(), Ordering::Relaxed);
    }

    fn mark_verified(&self) {
        self.last_verified_ms.store(now_ms(), Ordering::Relaxed);
    }

    fn idle_for(&self, now_ms: u64) -> Duration {
        let last = self.last_used_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms.saturating_sub(last))
    }

    fn unverified_for(&self, now_ms: u64) -> Duration {
        let last = self.last_verified_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms.saturating_sub(last))
    }
}

impl<T> ClientPool<T>
where
    T: ?Sized + Probe + 'static,
{
    pub fn new(name: impl Into<String>, config: ClientPoolConfig<T>) -> Self {
        Self {
            inner: Arc::new(ClientPoolInner {
                name: name.into(),
                slot: RwLock::new(None),
                config,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the live client, building or replacing it as needed.
    ///
    /// # Errors
    /// Propagates the build function's error; nothing is cached in that case.
    pub async fn get_or_connect(&self) -> Result<Arc<T>, ToolError> {
        let health_check_after = self.inner.config.health_check_after;
        {
            let slot = self.inner.slot.read().await;
            if let Some(entry) = slot.as_ref() {
                if entry.unverified_for(now_ms()) <= health_check_after {
                    entry.touch();
                    return Ok(entry.client.clone());
                }
            }
        }

        let mut slot = self.inner.slot.write().await;
        if let Some(entry) = slot.clone() {
            entry.touch();
            if entry.unverified_for(now_ms()) <= health_check_after {
                return Ok(entry.client.clone());
            }
            match entry.client.ping().await {
                Ok(()) => {
                    entry.mark_verified();
                    return Ok(entry.client.clone());
                }
                Err(err) => {
                    warn!(pool = %self.inner.name, error = %err, "client failed liveness check; reconnecting");
                    *slot = None;
                }
            }
        }

        debug!(pool = %self.inner.name, "building client");
        let build_client = self.inner.config.build_client.clone();
        let client = (build_client)().await?;
        *slot = Some(Arc::new(PooledClient::new(client.clone())));
        Ok(client)
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.slot.read().await.is_some()
    }

    /// Drops the client when it has been idle longer than the TTL.
    pub async fn evict_idle(&self) -> usize {
        let Some(ttl) = self.inner.config.ttl else {
            return 0;
        };
        let now = now_ms();
        let mut slot = self.inner.slot.write().await;
        match slot.as_ref() {
            Some(entry) if entry.idle_for(now) > ttl => {
                debug!(pool = %self.inner.name, "evicting idle client");
                *slot = None;
                1
            }
            _ => 0,
        }
    }

    pub fn spawn_sweeper(self) -> Option<tokio::task::JoinHandle<()>> {
        let _ttl = self.inner.config.ttl?;
        let interval = self.inner.config.sweep_interval;
        let pool = self;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let _ = pool.evict_idle().await;
            }
        }))
    }
}

#[async_trait]
impl<T> ClientSource<T> for ClientPool<T>
where
    T: ?Sized + Probe + 'static,
{
    async fn acquire(&self) -> Result<Arc<T>, ToolError> {
        self.get_or_connect().await
    }
}

fn now_ms() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}
