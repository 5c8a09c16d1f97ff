use async_trait::async_trait;
use hive_core::system;
use serde::Deserialize;
use tracing::warn;

use super::{Diagnostic, DiagnosticResult};

#[derive(Debug, Clone, Copy, Deserialize)]
struct LoadSettings {
    warning: f64,
    error: f64,
}

/// Fails when the host's one minute load average exceeds the error threshold.
pub struct LoadDiagnostic {
    warning: f64,
    error: f64,
    probe: fn() -> Option<f64>,
}

impl LoadDiagnostic {
    pub fn new(warning: f64, error: f64) -> Self {
        Self {
            warning,
            error,
            probe: system::load_average,
        }
    }

    pub fn from_settings(settings: &serde_json::Value) -> Option<Self> {
        let s: LoadSettings = serde_json::from_value(settings.clone()).ok()?;
        Some(Self::new(s.warning, s.error))
    }

    #[cfg(test)]
    fn with_probe(mut self, probe: fn() -> Option<f64>) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl Diagnostic for LoadDiagnostic {
    fn name(&self) -> &str {
        "load"
    }

    async fn diagnose(&self) -> DiagnosticResult {
        let Some(load) = (self.probe)() else {
            return DiagnosticResult::pass("load average unavailable");
        };
        if load > self.error {
            return DiagnosticResult::fail(format!(
                "load average {load:.2} above error threshold {}",
                self.error
            ));
        }
        if load > self.warning {
            warn!(target: "hive.worker.diagnostic", load, threshold = self.warning, "load average above warning threshold");
        }
        DiagnosticResult::pass(format!("load average {load:.2}"))
    }
}
