use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static WORKFLOW_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new(
            "reservation_workflow_outcomes_total",
            "Reservation workflow results by workflow and outcome",
        ),
        &["workflow", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
