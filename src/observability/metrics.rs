use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_created_total: IntCounterVec,
    pub booking_status_changes_total: IntCounterVec,
    pub promo_validations_total: IntCounterVec,
    pub route_optimizations_total: IntCounter,
    pub route_distance_miles: Histogram,
    pub notifications_total: IntCounterVec,
    pub notifications_in_queue: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created_total = IntCounterVec::new(
            Opts::new("bookings_created_total", "Bookings created by service"),
            &["service"],
        )
        .expect("valid bookings_created_total metric");

        let booking_status_changes_total = IntCounterVec::new(
            Opts::new(
                "booking_status_changes_total",
                "Booking status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid booking_status_changes_total metric");

        let promo_validations_total = IntCounterVec::new(
            Opts::new("promo_validations_total", "Promo code checks by outcome"),
            &["outcome"],
        )
        .expect("valid promo_validations_total metric");

        let route_optimizations_total =
            IntCounter::new("route_optimizations_total", "Routes optimized")
                .expect("valid route_optimizations_total metric");

        let route_distance_miles = Histogram::with_opts(
            HistogramOpts::new("route_distance_miles", "Total distance of optimized routes")
                .buckets(vec![1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )
        .expect("valid route_distance_miles metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notifications by channel and outcome"),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let notifications_in_queue = IntGauge::new(
            "notifications_in_queue",
            "Current number of notification jobs in queue",
        )
        .expect("valid notifications_in_queue metric");

        registry
            .register(Box::new(bookings_created_total.clone()))
            .expect("register bookings_created_total");
        registry
            .register(Box::new(booking_status_changes_total.clone()))
            .expect("register booking_status_changes_total");
        registry
            .register(Box::new(promo_validations_total.clone()))
            .expect("register promo_validations_total");
        registry
            .register(Box::new(route_optimizations_total.clone()))
            .expect("register route_optimizations_total");
        registry
            .register(Box::new(route_distance_miles.clone()))
            .expect("register route_distance_miles");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(notifications_in_queue.clone()))
            .expect("register notifications_in_queue");

        Self {
            registry,
            bookings_created_total,
            booking_status_changes_total,
            promo_validations_total,
            route_optimizations_total,
            route_distance_miles,
            notifications_total,
            notifications_in_queue,
        }
    }

    pub fn record_route(&self, total_distance: f64) {
        self.route_optimizations_total.inc();
        self.route_distance_miles.observe(total_distance);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_series() {
        let metrics = Metrics::new();
        metrics
            .bookings_created_total
            .with_label_values(&["standard"])
            .inc();
        metrics.record_route(3.2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("bookings_created_total{service=\"standard\"} 1"));
        assert!(text.contains("route_optimizations_total 1"));
        assert!(text.contains("route_distance_miles_count 1"));
    }
}
