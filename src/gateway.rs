//! Gateway Module
//!
//! Routes each request to the first cache partition that claims its URL.
//! Each partition is one [`CachingFetcher`] over its own store; requests no
//! partition claims go straight to the network.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{shared, CacheStats, CacheStore};
use crate::config::PartitionConfig;
use crate::error::FetchError;
use crate::fetch::{
    CachingFetcher, FetchHooks, PolicyError, Request, Response, RoutePolicy, Transport,
};
use crate::tasks::BackgroundTasks;

pub struct Gateway {
    partitions: Vec<CachingFetcher>,
    passthrough: CachingFetcher,
    background: BackgroundTasks,
}

impl Gateway {
    /// Creates a gateway with no partitions; everything goes to the network.
    pub fn new(transport: Arc<dyn Transport>, hooks: Arc<dyn FetchHooks>) -> Self {
        let passthrough = CachingFetcher::new(
            RoutePolicy::new(Vec::new()),
            shared(CacheStore::new(1)),
            transport,
        )
        .with_name("passthrough")
        .with_hooks(hooks);

        Self {
            partitions: Vec::new(),
            passthrough,
            background: BackgroundTasks::new(),
        }
    }

    /// Builds one partition per configuration entry, in order.
    pub fn from_config(
        partitions: &[PartitionConfig],
        transport: Arc<dyn Transport>,
        hooks: Arc<dyn FetchHooks>,
        default_timeout: Duration,
    ) -> Result<Self, PolicyError> {
        let mut gateway = Self::new(transport.clone(), hooks.clone());

        for partition in partitions {
            let policy = RoutePolicy::from_config(partition.routes.clone())?;
            let store = shared(CacheStore::new(partition.capacity));
            let fetcher = CachingFetcher::new(policy, store, transport.clone())
                .with_name(partition.name.clone())
                .with_hooks(hooks.clone())
                .with_default_timeout(default_timeout);

            info!(
                partition = %partition.name,
                capacity = partition.capacity,
                routes = partition.routes.len(),
                "Cache partition ready"
            );
            gateway = gateway.with_partition(fetcher);
        }

        Ok(gateway)
    }

    /// Appends a partition. Its revalidations join the gateway's task set.
    pub fn with_partition(mut self, fetcher: CachingFetcher) -> Self {
        self.partitions
            .push(fetcher.with_background(self.background.clone()));
        self
    }

    /// Partition that serves `url`, or the network-only passthrough.
    pub fn route(&self, url: &str) -> &CachingFetcher {
        self.partitions
            .iter()
            .find(|p| p.handles(url))
            .unwrap_or(&self.passthrough)
    }

    pub async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.route(&request.url).fetch(request).await
    }

    pub fn partition(&self, name: &str) -> Option<&CachingFetcher> {
        self.partitions.iter().find(|p| p.name() == name)
    }

    pub fn partitions(&self) -> &[CachingFetcher] {
        &self.partitions
    }

    /// Stats per partition, in routing order.
    pub async fn stats(&self) -> Vec<(String, CacheStats)> {
        let mut all = Vec::with_capacity(self.partitions.len());
        for partition in &self.partitions {
            all.push((partition.name().to_string(), partition.stats().await));
        }
        all
    }

    /// Revalidation tasks of every partition.
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_partitions;
    use crate::error::TransportError;
    use crate::fetch::{NoopHooks, ServedFrom};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the request path as the body.
    #[derive(Default)]
    struct EchoTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new(200, request.url.clone()))
        }
    }

    fn default_gateway() -> (Gateway, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport::default());
        let gateway = Gateway::from_config(
            &default_partitions(),
            transport.clone(),
            Arc::new(NoopHooks),
            Duration::from_secs(3),
        )
        .unwrap();
        (gateway, transport)
    }

    #[test]
    fn test_routes_to_partitions_in_order() {
        let (gateway, _) = default_gateway();

        assert_eq!(gateway.route("/static/frontend/js/main.js").name(), "static");
        assert_eq!(gateway.route("/favicon.ico").name(), "static");
        assert_eq!(gateway.route("/api/v1/clients/").name(), "api");
        assert_eq!(gateway.route("/api/v2/unknown/").name(), "api");
        assert_eq!(gateway.route("/workorders/").name(), "pages");
        assert_eq!(gateway.route("/media/photo").name(), "passthrough");
    }

    #[tokio::test]
    async fn test_unclaimed_requests_go_to_network() {
        let (gateway, transport) = default_gateway();

        gateway.fetch(&Request::get("/media/photo")).await.unwrap();
        gateway.fetch(&Request::get("/media/photo")).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_partitions_have_separate_stores() {
        let (gateway, transport) = default_gateway();

        gateway.fetch(&Request::get("/static/frontend/css/main.css")).await.unwrap();
        let cached = gateway
            .fetch(&Request::get("/static/frontend/css/main.css"))
            .await
            .unwrap();
        gateway.fetch(&Request::get("/api/v1/products/")).await.unwrap();

        assert_eq!(cached.served_from, ServedFrom::Cache);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        let stats = gateway.stats().await;
        let entries: Vec<(&str, usize)> = stats
            .iter()
            .map(|(name, s)| (name.as_str(), s.total_entries))
            .collect();
        assert_eq!(entries, vec![("static", 1), ("api", 1), ("pages", 0)]);
    }

    #[tokio::test]
    async fn test_revalidations_share_gateway_tasks() {
        let (gateway, transport) = default_gateway();
        let request = Request::get("/api/v1/equipment/");

        gateway.fetch(&request).await.unwrap();
        gateway.fetch(&request).await.unwrap();
        gateway.background().settle().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_partition_lookup() {
        let (gateway, _) = default_gateway();

        assert!(gateway.partition("api").is_some());
        assert!(gateway.partition("nope").is_none());
        assert_eq!(gateway.partitions().len(), 3);
    }
}
