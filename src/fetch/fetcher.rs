//! Caching Fetcher Module
//!
//! Applies the route policy to each outgoing request, choosing between the
//! network and one store partition.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    cache_key, is_storable, FetchHooks, NoopHooks, Request, Response, RoutePolicy, RouteRule, ServedFrom,
    Strategy, Transport,
};
use crate::cache::{CacheStats, SharedStore};
use crate::error::FetchError;
use crate::tasks::BackgroundTasks;

/// Network bound for `networkFirst` routes that do not set their own.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(3);

// == Caching Fetcher ==
/// Strategy engine over one store partition.
///
/// Only GET requests ever read or write the store. The store is written only
/// after a fetch completes with a 2xx status, so a dropped (cancelled)
/// `fetch` future leaves it untouched. Responses that are private to one
/// client are never written.
pub struct CachingFetcher {
    /// Partition name used in logs
    name: String,
    policy: RoutePolicy,
    store: SharedStore,
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn FetchHooks>,
    background: BackgroundTasks,
    /// Keys with a revalidation in flight
    revalidating: Arc<Mutex<HashSet<String>>>,
    default_timeout: Duration,
}

impl CachingFetcher {
    // == Constructor ==
    pub fn new(policy: RoutePolicy, store: SharedStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: "default".to_string(),
            policy,
            store,
            transport,
            hooks: Arc::new(NoopHooks),
            background: BackgroundTasks::new(),
            revalidating: Arc::new(Mutex::new(HashSet::new())),
            default_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn FetchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Uses a shared task set for revalidations.
    pub fn with_background(mut self, background: BackgroundTasks) -> Self {
        self.background = background;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Revalidation tasks spawned by this fetcher.
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Whether the policy has an explicit rule for this URL.
    pub fn handles(&self, url: &str) -> bool {
        self.policy.find(url).is_some()
    }

    // == Fetch ==
    /// Serves `request` according to its route's strategy.
    pub async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.hooks.on_request_start(request);

        let result = self.dispatch(request).await;

        if let Ok(response) = &result {
            if response.served_from == ServedFrom::Cache {
                self.hooks.on_served_from_cache(request, response.stale);
            }
        }
        self.hooks.on_request_end(request, result.as_ref());
        result
    }

    async fn dispatch(&self, request: &Request) -> Result<Response, FetchError> {
        let key = cache_key(request);

        if !request.is_cacheable_method() {
            debug!(partition = %self.name, method = %request.method, url = %request.url, "Bypassing cache");
            return send_checked(self.transport.as_ref(), &key, request).await;
        }

        let rule = self.policy.resolve(&request.url);
        debug!(partition = %self.name, url = %request.url, strategy = %rule.strategy, "Route matched");

        match rule.strategy {
            Strategy::NetworkOnly => send_checked(self.transport.as_ref(), &key, request).await,
            Strategy::CacheFirst => self.cache_first(&key, request, rule).await,
            Strategy::NetworkFirst => self.network_first(&key, request, rule).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&key, request, rule).await,
        }
    }

    // == Cache First ==
    async fn cache_first(
        &self,
        key: &str,
        request: &Request,
        rule: &RouteRule,
    ) -> Result<Response, FetchError> {
        let cached = self.store.write().await.get(key);
        if let Some(entry) = cached {
            return Ok(Response::from_cache(entry.value, false));
        }

        let response = send_checked(self.transport.as_ref(), key, request).await?;
        write_back(&self.store, key, &response, rule.max_age).await;
        Ok(response)
    }

    // == Network First ==
    async fn network_first(
        &self,
        key: &str,
        request: &Request,
        rule: &RouteRule,
    ) -> Result<Response, FetchError> {
        let limit = rule.timeout.unwrap_or(self.default_timeout);
        let attempt = send_checked(self.transport.as_ref(), key, request);

        let outcome = match tokio::time::timeout(limit, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout {
                key: key.to_string(),
                after: limit,
            }),
        };

        let cause = match outcome {
            Ok(response) => {
                write_back(&self.store, key, &response, rule.max_age).await;
                return Ok(response);
            }
            Err(cause) => cause,
        };

        let fallback = self.store.write().await.peek(key);
        match fallback {
            Some(lookup) => {
                warn!(partition = %self.name, key = %key, error = %cause, fresh = lookup.fresh, "Network failed, serving cached copy");
                Ok(Response::from_cache(lookup.entry.value, !lookup.fresh))
            }
            None => Err(FetchError::unavailable(key, cause)),
        }
    }

    // == Stale While Revalidate ==
    async fn stale_while_revalidate(
        &self,
        key: &str,
        request: &Request,
        rule: &RouteRule,
    ) -> Result<Response, FetchError> {
        let cached = self.store.write().await.peek(key);

        if let Some(lookup) = cached {
            self.spawn_revalidation(key, request, rule.max_age);
            return Ok(Response::from_cache(lookup.entry.value, !lookup.fresh));
        }

        match send_checked(self.transport.as_ref(), key, request).await {
            Ok(response) => {
                write_back(&self.store, key, &response, rule.max_age).await;
                Ok(response)
            }
            Err(cause) => Err(FetchError::unavailable(key, cause)),
        }
    }

    /// At most one revalidation per key is in flight; later hits ride on it.
    fn spawn_revalidation(&self, key: &str, request: &Request, max_age: Duration) {
        let Some(in_flight) = InFlight::claim(&self.revalidating, key) else {
            debug!(partition = %self.name, key = %key, "Revalidation already in flight");
            return;
        };
        let store = self.store.clone();
        let transport = self.transport.clone();
        let partition = self.name.clone();
        let key = key.to_string();
        let request = request.clone();

        self.background.spawn(async move {
            let _in_flight = in_flight;
            match send_checked(transport.as_ref(), &key, &request).await {
                Ok(response) => {
                    write_back(&store, &key, &response, max_age).await;
                    debug!(partition = %partition, key = %key, "Revalidated cache entry");
                }
                Err(err) => {
                    warn!(partition = %partition, key = %key, error = %err, "Background revalidation failed");
                }
            }
        });
    }

    // == Precache ==
    /// Fetches each URL from the network and stores it under its route's
    /// max age. URLs whose route never caches, and URLs that fail, are
    /// skipped. Returns the number stored.
    pub async fn precache<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stored = 0;
        for url in urls {
            let request = Request::get(url);
            let rule = self.policy.resolve(&request.url);
            if rule.strategy == Strategy::NetworkOnly {
                debug!(partition = %self.name, url = %request.url, "Skipping precache of network-only route");
                continue;
            }

            let key = cache_key(&request);
            match send_checked(self.transport.as_ref(), &key, &request).await {
                Ok(response) => {
                    if write_back(&self.store, &key, &response, rule.max_age).await {
                        stored += 1;
                    }
                }
                Err(err) => {
                    warn!(partition = %self.name, url = %request.url, error = %err, "Failed to precache URL");
                }
            }
        }
        info!(partition = %self.name, stored, "Precache finished");
        stored
    }

    // == Invalidation ==
    /// Drops the stored response for `request`, if any.
    pub async fn invalidate(&self, request: &Request) -> bool {
        self.store.write().await.delete(&cache_key(request))
    }

    /// Drops every stored response in this partition.
    pub async fn clear(&self) {
        self.store.write().await.clear();
        info!(partition = %self.name, "Cache partition cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }
}

/// Sends through the transport and turns non-2xx statuses into errors.
async fn send_checked(
    transport: &dyn Transport,
    key: &str,
    request: &Request,
) -> Result<Response, FetchError> {
    let response = transport
        .send(request)
        .await
        .map_err(|err| FetchError::transport(key, err))?;

    if response.is_success() {
        Ok(response)
    } else {
        Err(FetchError::status(key, response))
    }
}

/// Stores `response` unless it is private to one client, in which case any
/// older copy is dropped. Returns whether it was stored.
async fn write_back(
    store: &SharedStore,
    key: &str,
    response: &Response,
    max_age: Duration,
) -> bool {
    let mut store = store.write().await;
    if !is_storable(response) {
        store.delete(key);
        debug!(key = %key, "Response is not storable in a shared cache");
        return false;
    }
    store.set(key.to_string(), response.to_cached(), max_age);
    true
}

/// Marks a key as being revalidated until dropped, including on abort.
struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlight {
    fn claim(keys: &Arc<Mutex<HashSet<String>>>, key: &str) -> Option<Self> {
        let inserted = keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string());
        inserted.then(|| Self {
            keys: keys.clone(),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}
