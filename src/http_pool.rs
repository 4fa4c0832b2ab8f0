//! Bounded, shared pool of [`reqwest::Client`] handles.
//!
//! Providers and MCP clients each need an HTTP client, and `reqwest::Client`
//! is already an `Arc`-backed connection pool internally, but a long-running
//! host process (one process, many sessions, many short-lived agents) still
//! benefits from capping how many distinct clients exist at once and reusing
//! idle ones rather than spinning up a fresh client (and its own connection
//! pool) per request. This mirrors the acquire/release/idle-scavenge pool
//! from the original runtime's hosted HTTP pool, built here on
//! `tokio::sync::{Mutex, Notify}` instead of pthread mutex/condvar.

use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

/// Pool tuning knobs, defaulting to the same values the original hosted
/// runtime shipped with.
#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    /// Maximum number of live clients the pool will create.
    pub max_connections: usize,
    /// How long an idle client may sit before being scavenged.
    pub idle_timeout: Duration,
    /// How long [`HttpPool::acquire`] waits for a client before timing out.
    pub acquire_timeout: Duration,
    /// Default per-request timeout applied to clients the pool creates.
    pub request_timeout: Duration,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            idle_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct Entry {
    client: reqwest::Client,
    last_used: Instant,
}

struct Inner {
    config: HttpPoolConfig,
    idle: VecDeque<Entry>,
    total_count: usize,
    shutting_down: bool,
    stats: Stats,
}

#[derive(Debug, Default, Clone, Copy)]
struct Stats {
    total_acquires: u64,
    pool_hits: u64,
    pool_misses: u64,
    timeouts: u64,
}

/// A pooled `reqwest::Client`, returned to the pool automatically on drop.
pub struct PooledClient {
    client: Option<reqwest::Client>,
    pool: HttpPool,
}

impl std::ops::Deref for PooledClient {
    type Target = reqwest::Client;

    fn deref(&self) -> &Self::Target {
        self.client
            .as_ref()
            .expect("PooledClient used after being returned")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

/// Thread-safe, cloneable handle to a bounded HTTP client pool.
#[derive(Clone)]
pub struct HttpPool {
    inner: Arc<Mutex<Inner>>,
    available: Arc<Notify>,
}

impl HttpPool {
    /// Create a new pool with the given configuration.
    pub fn new(config: HttpPoolConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                config,
                idle: VecDeque::new(),
                total_count: 0,
                shutting_down: false,
                stats: Stats::default(),
            })),
            available: Arc::new(Notify::new()),
        }
    }

    /// Acquire a client, reusing an idle one if available, creating a new
    /// one if under `max_connections`, or waiting (up to `acquire_timeout`)
    /// for one to be released otherwise.
    pub async fn acquire(&self) -> Result<PooledClient> {
        let deadline = {
            let mut inner = self.inner.lock().await;
            if inner.shutting_down {
                return Err(Error::invalid_state("HTTP pool is shutting down"));
            }
            inner.stats.total_acquires += 1;

            self.scavenge_idle_locked(&mut inner);

            if let Some(entry) = inner.idle.pop_front() {
                inner.stats.pool_hits += 1;
                return Ok(self.wrap(entry.client));
            }

            if inner.total_count < inner.config.max_connections {
                inner.stats.pool_misses += 1;
                inner.total_count += 1;
                let request_timeout = inner.config.request_timeout;
                let client = reqwest::Client::builder()
                    .timeout(request_timeout)
                    .build()
                    .map_err(Error::Http)?;
                return Ok(self.wrap(client));
            }

            Instant::now() + inner.config.acquire_timeout
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let mut inner = self.inner.lock().await;
                inner.stats.timeouts += 1;
                return Err(Error::timeout());
            }

            if timeout(remaining, self.available.notified()).await.is_err() {
                let mut inner = self.inner.lock().await;
                inner.stats.timeouts += 1;
                return Err(Error::timeout());
            }

            let mut inner = self.inner.lock().await;
            if inner.shutting_down {
                return Err(Error::invalid_state("HTTP pool is shutting down"));
            }
            if let Some(entry) = inner.idle.pop_front() {
                inner.stats.pool_hits += 1;
                return Ok(self.wrap(entry.client));
            }
        }
    }

    fn wrap(&self, client: reqwest::Client) -> PooledClient {
        PooledClient {
            client: Some(client),
            pool: self.clone(),
        }
    }

    fn release(&self, client: reqwest::Client) {
        let inner = self.inner.clone();
        let available = self.available.clone();
        tokio::spawn(async move {
            let mut inner = inner.lock().await;
            if inner.shutting_down {
                inner.total_count = inner.total_count.saturating_sub(1);
                return;
            }
            inner.idle.push_back(Entry {
                client,
                last_used: Instant::now(),
            });
            drop(inner);
            available.notify_one();
        });
    }

    fn scavenge_idle_locked(&self, inner: &mut Inner) {
        if inner.config.idle_timeout.is_zero() {
            return;
        }
        let idle_timeout = inner.config.idle_timeout;
        let before = inner.idle.len();
        inner.idle.retain(|e| e.last_used.elapsed() < idle_timeout);
        let scavenged = before - inner.idle.len();
        inner.total_count = inner.total_count.saturating_sub(scavenged);
    }

    /// Number of idle clients currently held.
    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }

    /// Number of clients (idle + in-use) the pool has created.
    pub async fn total_count(&self) -> usize {
        self.inner.lock().await.total_count
    }

    /// Drain the pool, refusing further acquires. Waits up to
    /// `shutdown_timeout` for in-flight clients to be returned before
    /// giving up and dropping them anyway.
    pub async fn shutdown(&self, shutdown_timeout: Duration) {
        {
            let mut inner = self.inner.lock().await;
            inner.shutting_down = true;
        }

        let deadline = Instant::now() + shutdown_timeout;
        loop {
            {
                let inner = self.inner.lock().await;
                if inner.idle.len() >= inner.total_count {
                    break;
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            let _ = timeout(Duration::from_millis(50), self.available.notified()).await;
        }

        let mut inner = self.inner.lock().await;
        inner.idle.clear();
        inner.total_count = 0;
    }
}

impl Default for HttpPool {
    fn default() -> Self {
        Self::new(HttpPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_creates_up_to_max_connections() {
        let pool = HttpPool::new(HttpPoolConfig {
            max_connections: 2,
            ..Default::default()
        });

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.total_count().await, 2);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let pool = HttpPool::new(HttpPoolConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let _held = pool.acquire().await.unwrap();
        let result = pool.acquire().await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn released_client_is_reused() {
        let pool = HttpPool::new(HttpPoolConfig {
            max_connections: 1,
            ..Default::default()
        });

        {
            let _client = pool.acquire().await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.idle_count().await, 1);

        let _client2 = pool.acquire().await.unwrap();
        assert_eq!(pool.total_count().await, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_pool() {
        let pool = HttpPool::new(HttpPoolConfig::default());
        let client = pool.acquire().await.unwrap();
        drop(client);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(pool.total_count().await, 0);
        assert!(pool.acquire().await.is_err());
    }
}
