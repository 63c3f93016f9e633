//! OpenTelemetry metrics initialization.
//!
//! When an OTLP endpoint is configured, metrics export there on a periodic
//! pipeline; otherwise no provider is installed and every instrument in
//! [`crate::perk::metrics`] is a no-op. Logging stays on `env_logger`.

use crate::perk::error::PerkError;
use opentelemetry_sdk::metrics::SdkMeterProvider;

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Optional OTLP endpoint (e.g. "http://localhost:4317").
    pub endpoint: Option<String>,
    /// The service name reported in telemetry signals.
    pub service_name: String,
}

/// Guard that shuts down the meter provider on drop.
///
/// Hold it for the lifetime of the application; dropping it flushes and
/// shuts down the export pipeline.
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Force-flush the metrics pipeline (useful right before exit).
    pub fn force_flush(&self) {
        if let Some(ref provider) = self.meter_provider {
            let _ = provider.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.meter_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Initialize the metrics pipeline.
pub fn init_metrics(config: TelemetryConfig) -> Result<TelemetryGuard, PerkError> {
    use opentelemetry_otlp::WithExportConfig as _;

    let Some(endpoint) = config.endpoint else {
        return Ok(TelemetryGuard {
            meter_provider: None,
        });
    };

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()
        .map_err(|e| PerkError::config(format!("failed to create OTLP metric exporter: {e}")))?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(config.service_name)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());

    Ok(TelemetryGuard {
        meter_provider: Some(provider),
    })
}
