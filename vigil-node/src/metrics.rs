use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Node-wide Prometheus metrics.
pub struct NodeMetrics {
    /// Quorum-signed VAAs this node assembled.
    pub vaas_published: Counter,
    pub guardian_set_index: Gauge,
    /// Gossip shed by full queues or unreachable peers, inbound and outbound.
    pub gossip_dropped: Gauge,
    pub registry: Registry,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let vaas_published = Counter::default();
        let guardian_set_index = Gauge::default();
        let gossip_dropped = Gauge::default();

        registry.register(
            "vigil_vaas_published",
            "Total VAAs published with quorum",
            vaas_published.clone(),
        );
        registry.register(
            "vigil_guardian_set_index",
            "Index of the current guardian set",
            guardian_set_index.clone(),
        );
        registry.register(
            "vigil_gossip_dropped",
            "Gossip messages dropped by the relay",
            gossip_dropped.clone(),
        );

        Self {
            vaas_published,
            guardian_set_index,
            gossip_dropped,
            registry,
        }
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_encode() {
        let metrics = NodeMetrics::new();
        metrics.vaas_published.inc();
        metrics.vaas_published.inc();
        metrics.guardian_set_index.set(4);
        metrics.gossip_dropped.set(17);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("vigil_vaas_published_total 2"));
        assert!(encoded.contains("vigil_guardian_set_index 4"));
        assert!(encoded.contains("vigil_gossip_dropped 17"));
    }
}
