use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct NodeMetrics {
    pub calls_sent: u64,
    pub calls_failed: u64,
    pub requests_served: u64,
    pub stabilize_passes: u64,
    pub successor_failovers: u64,
    pub predecessor_failures: u64,
    pub keys_handed_off: u64,
    pub uptime: Duration,
    pub start_time: Instant,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            calls_sent: 0,
            calls_failed: 0,
            requests_served: 0,
            stabilize_passes: 0,
            successor_failovers: 0,
            predecessor_failures: 0,
            keys_handed_off: 0,
            uptime: Duration::new(0, 0),
            start_time: Instant::now(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<NodeMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_call(&self, ok: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.calls_sent += 1;
        if !ok {
            metrics.calls_failed += 1;
        }
    }

    pub async fn record_request_served(&self) {
        self.metrics.write().await.requests_served += 1;
    }

    pub async fn record_stabilize_pass(&self) {
        self.metrics.write().await.stabilize_passes += 1;
    }

    pub async fn record_successor_failover(&self, dropped: usize) {
        self.metrics.write().await.successor_failovers += dropped as u64;
    }

    pub async fn record_predecessor_failure(&self) {
        self.metrics.write().await.predecessor_failures += 1;
    }

    pub async fn record_keys_handed_off(&self, count: usize) {
        self.metrics.write().await.keys_handed_off += count as u64;
    }

    pub async fn get_metrics(&self) -> NodeMetrics {
        let mut metrics = self.metrics.read().await.clone();
        metrics.uptime = metrics.start_time.elapsed();
        metrics
    }

    pub async fn print_stats(&self) {
        let metrics = self.get_metrics().await;

        println!("\n=== DHT Node Statistics ===");
        println!("Uptime: {:.2?}", metrics.uptime);
        println!(
            "Calls: {} sent, {} failed",
            metrics.calls_sent, metrics.calls_failed
        );
        println!("Requests served: {}", metrics.requests_served);
        println!(
            "Stabilization: {} passes, {} successor fail-overs, {} predecessor failures",
            metrics.stabilize_passes, metrics.successor_failovers, metrics.predecessor_failures
        );
        println!("Keys handed off: {}", metrics.keys_handed_off);
        println!("===========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_call(true).await;
        metrics.record_call(false).await;
        metrics.record_successor_failover(2).await;
        metrics.record_keys_handed_off(3).await;

        let snapshot = metrics.get_metrics().await;
        assert_eq!(snapshot.calls_sent, 2);
        assert_eq!(snapshot.calls_failed, 1);
        assert_eq!(snapshot.successor_failovers, 2);
        assert_eq!(snapshot.keys_handed_off, 3);
    }
}
