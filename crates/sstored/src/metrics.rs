//! Prometheus counters for the HTTP surface

use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

type Labels = Vec<(String, String)>;

pub struct Metrics {
    registry: Registry,
    uploads: Family<Labels, Counter>,
    downloads: Family<Labels, Counter>,
    rate_limited: Counter,
    limiter_clients: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let uploads = Family::<Labels, Counter>::default();
        let downloads = Family::<Labels, Counter>::default();
        let rate_limited = Counter::default();
        let limiter_clients = Gauge::default();

        registry.register(
            "sstore_uploads",
            "Upload requests by outcome",
            uploads.clone(),
        );
        registry.register(
            "sstore_downloads",
            "Download requests by outcome",
            downloads.clone(),
        );
        registry.register(
            "sstore_rate_limited",
            "Requests rejected by the rate limiter",
            rate_limited.clone(),
        );
        registry.register(
            "sstore_limiter_clients",
            "Client buckets currently tracked by the rate limiter",
            limiter_clients.clone(),
        );

        Self {
            registry,
            uploads,
            downloads,
            rate_limited,
            limiter_clients,
        }
    }

    pub fn record_upload(&self, outcome: &str) {
        self.uploads.get_or_create(&outcome_label(outcome)).inc();
    }

    pub fn record_download(&self, outcome: &str) {
        self.downloads.get_or_create(&outcome_label(outcome)).inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.inc();
    }

    pub fn set_limiter_clients(&self, clients: usize) {
        self.limiter_clients
            .set(i64::try_from(clients).unwrap_or(i64::MAX));
    }

    /// Render the registry in Prometheus text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

fn outcome_label(outcome: &str) -> Labels {
    vec![("outcome".to_string(), outcome.to_string())]
}
