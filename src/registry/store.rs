//! Deduplicating packument store
//!
//! One in-flight or completed fetch per `(url, full_metadata)` key. Every
//! caller asking for the same key joins the same shared future, so the
//! registry sees a single request and all callers observe the same outcome.
//! Failed fetches are evicted once they are terminal so the next caller
//! starts over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::config::{CORGI_DOC, FULL_DOC, LOCAL_CACHE_HEADER};
use crate::registry::retry::{Resume, RetryPolicy};
use crate::registry::transport::{RegistryResponse, Transport};
use crate::version::error::RegistryError;
use crate::version::packument::Packument;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Packument>, RegistryError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    full_metadata: bool,
}

struct Entry {
    id: u64,
    fetch: SharedFetch,
}

struct Inner {
    transport: Arc<dyn Transport>,
    retry: Option<Arc<dyn RetryPolicy>>,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    next_id: AtomicU64,
}

/// Cheap to clone; clones share the same entries
#[derive(Clone)]
pub struct PackumentStore {
    inner: Arc<Inner>,
}

impl PackumentStore {
    pub fn new(transport: Arc<dyn Transport>, retry: Option<Arc<dyn RetryPolicy>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                retry,
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch the packument at `url`, joining an existing fetch for the same key
    ///
    /// An abbreviated fetch answered with 404 is re-issued once as a full
    /// metadata fetch; its result becomes the result of this call.
    pub async fn fetch(
        &self,
        url: &str,
        package_name: &str,
        full_metadata: bool,
    ) -> Result<Arc<Packument>, RegistryError> {
        let key = CacheKey {
            url: url.to_string(),
            full_metadata,
        };
        join(&self.inner, key, package_name).await
    }

    /// Number of cached or in-flight entries
    pub fn len(&self) -> usize {
        self.inner.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; in-flight fetches still complete for callers already waiting
    pub fn clear(&self) {
        self.inner.lock_entries().clear();
    }
}

impl Inner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the entry for `key` only if it is still the one created as `id`
    fn evict(&self, key: &CacheKey, id: u64) {
        let mut entries = self.lock_entries();
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
            debug!("Evicted failed fetch for {}", key.url);
        }
    }

    async fn fetch_once(
        &self,
        key: &CacheKey,
        package_name: &str,
    ) -> Result<Packument, RegistryError> {
        let accept = if key.full_metadata { FULL_DOC } else { CORGI_DOC };
        info!(
            "Fetching {} ({} metadata)",
            key.url,
            if key.full_metadata { "full" } else { "abbreviated" }
        );

        let response = self.transport.fetch(&key.url, accept).await?;
        decode_response(response, package_name)
    }
}

/// Join the fetch for `key`, starting one if none exists
///
/// Lookup and insertion happen under one lock so concurrent callers cannot
/// both start a request.
fn join(inner: &Arc<Inner>, key: CacheKey, package_name: &str) -> SharedFetch {
    let mut entries = inner.lock_entries();
    if let Some(entry) = entries.get(&key) {
        debug!("Joining existing fetch for {}", key.url);
        return entry.fetch.clone();
    }

    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
    let fetch = request(
        Arc::downgrade(inner),
        key.clone(),
        id,
        package_name.to_string(),
    )
    .boxed()
    .shared();
    entries.insert(
        key,
        Entry {
            id,
            fetch: fetch.clone(),
        },
    );
    fetch
}

/// Drive one cache entry to a terminal outcome
///
/// Holds the store weakly between attempts; a parked retry never keeps a
/// dropped store alive.
async fn request(
    inner: Weak<Inner>,
    key: CacheKey,
    id: u64,
    package_name: String,
) -> Result<Arc<Packument>, RegistryError> {
    let mut attempt = 0;
    let mut last_err = None;

    loop {
        let Some(store) = inner.upgrade() else {
            debug!("Store dropped, abandoning fetch for {}", package_name);
            return Err(last_err.unwrap_or_else(|| {
                RegistryError::InvalidResponse("packument store was dropped".to_string())
            }));
        };

        let err = match store.fetch_once(&key, &package_name).await {
            Ok(packument) => return Ok(Arc::new(packument)),
            Err(err) => err,
        };

        if err.is_not_found() && !key.full_metadata {
            store.evict(&key, id);
            info!(
                "{} not found in abbreviated metadata, retrying with full metadata",
                package_name
            );
            let full = CacheKey {
                url: key.url.clone(),
                full_metadata: true,
            };
            let fetch = join(&store, full, &package_name);
            drop(store);
            return fetch.await;
        }

        let Some(policy) = store.retry.clone() else {
            store.evict(&key, id);
            return Err(err);
        };
        drop(store);

        attempt += 1;
        let (resume, resumed) = Resume::channel();
        policy.retry(&err, &package_name, attempt, resume);

        if resumed.await.is_err() {
            warn!("Fetching {} failed: {}", package_name, err);
            if let Some(store) = inner.upgrade() {
                store.evict(&key, id);
            }
            return Err(err);
        }
        debug!("Resuming fetch for {} (attempt {})", package_name, attempt + 1);
        last_err = Some(err);
    }
}

fn decode_response(
    response: RegistryResponse,
    package_name: &str,
) -> Result<Packument, RegistryError> {
    match response.status {
        200..=299 => {}
        404 => return Err(RegistryError::NotFound(package_name.to_string())),
        429 => {
            let retry_after_secs = response
                .header("retry-after")
                .and_then(|v| v.trim().parse().ok());
            return Err(RegistryError::RateLimited { retry_after_secs });
        }
        status => {
            warn!("npm registry returned status {}: {}", status, package_name);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }
    }

    let mut packument: Packument = serde_json::from_slice(&response.body).map_err(|e| {
        warn!("Failed to parse packument for {}: {}", package_name, e);
        RegistryError::InvalidResponse(e.to_string())
    })?;

    packument.cached = response.header(LOCAL_CACHE_HEADER).is_some();
    packument.content_length = response
        .header("content-length")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    Ok(packument)
}
