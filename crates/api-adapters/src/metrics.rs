//! Business counters exposed on `/metrics` in the OpenMetrics text format.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    pub event: String,
}

pub struct Metrics {
    registry: Registry,
    checkouts: Family<OutcomeLabels, Counter>,
    verifications: Family<OutcomeLabels, Counter>,
    callbacks: Family<OutcomeLabels, Counter>,
    webhooks: Family<EventLabels, Counter>,
    enrollments_written: Counter,
    certificates_issued: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("course_market");
        let checkouts = Family::<OutcomeLabels, Counter>::default();
        let verifications = Family::<OutcomeLabels, Counter>::default();
        let callbacks = Family::<OutcomeLabels, Counter>::default();
        let webhooks = Family::<EventLabels, Counter>::default();
        let enrollments_written = Counter::default();
        let certificates_issued = Counter::default();

        registry.register("checkouts", "Checkout attempts by outcome", checkouts.clone());
        registry.register(
            "payment_verifications",
            "Gateway verifications by result",
            verifications.clone(),
        );
        registry.register("payment_callbacks", "Payment callbacks by outcome", callbacks.clone());
        registry.register("webhook_events", "Accepted gateway webhook events", webhooks.clone());
        registry.register(
            "enrollments_written",
            "Enrollments created by free checkout or confirmed payment",
            enrollments_written.clone(),
        );
        registry.register(
            "certificates_issued",
            "Certificates issued by administrators",
            certificates_issued.clone(),
        );

        Self {
            registry,
            checkouts,
            verifications,
            callbacks,
            webhooks,
            enrollments_written,
            certificates_issued,
        }
    }

    pub fn checkout(&self, outcome: &str) {
        self.checkouts.get_or_create(&OutcomeLabels { outcome: outcome.to_string() }).inc();
    }

    pub fn verification(&self, outcome: &str) {
        self.verifications.get_or_create(&OutcomeLabels { outcome: outcome.to_string() }).inc();
    }

    pub fn callback(&self, outcome: &str) {
        self.callbacks.get_or_create(&OutcomeLabels { outcome: outcome.to_string() }).inc();
    }

    pub fn webhook(&self, event: &str) {
        self.webhooks.get_or_create(&EventLabels { event: event.to_string() }).inc();
    }

    pub fn enrollment_written(&self) {
        self.enrollments_written.inc();
    }

    pub fn certificate_issued(&self) {
        self.certificates_issued.inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
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
    fn counters_render_with_prefix_and_labels() {
        let metrics = Metrics::new();
        metrics.callback("enrolled");
        metrics.callback("enrolled");
        metrics.callback("amount_mismatch");
        metrics.certificate_issued();
        metrics.enrollment_written();

        let text = metrics.render().unwrap();
        assert!(text.contains("course_market_payment_callbacks_total{outcome=\"enrolled\"} 2"));
        assert!(text.contains("course_market_payment_callbacks_total{outcome=\"amount_mismatch\"} 1"));
        assert!(text.contains("course_market_certificates_issued_total 1"));
        assert!(text.contains("course_market_enrollments_written_total 1"));
        assert!(text.ends_with("# EOF\n"));
    }
}
