use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("wa_gateway_statds")
        .with_description("WhatsApp gateway statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_send_statds(outcome: &str) {
    incr_statds("send".to_string(), outcome.into())
}

pub fn incr_session_statds(phase: &str) {
    incr_statds("session".to_string(), phase.into())
}
