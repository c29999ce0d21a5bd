use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_attempt(outcome: &'static str) {
    metrics::counter!("quiz_attempts_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_submission(status: &'static str) {
    metrics::counter!("quiz_submissions_total", "status" => status).increment(1);
}

pub(crate) fn record_finalize_retry() {
    metrics::counter!("quiz_finalize_retries_total").increment(1);
}
