//! Device health checks run before every reservation attempt.

mod load;
pub use load::LoadDiagnostic;

use async_trait::async_trait;
use hive_core::HiveConfig;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticResult {
    pub status: DiagnosticStatus,
    pub message: String,
}

impl DiagnosticResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            status: DiagnosticStatus::Pass,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: DiagnosticStatus::Fail,
            message: message.into(),
        }
    }

    pub fn failed(&self) -> bool {
        self.status == DiagnosticStatus::Fail
    }
}

/// One health check. `run` diagnoses and, on failure, tries a repair.
#[async_trait]
pub trait Diagnostic: Send + Sync {
    fn name(&self) -> &str;

    async fn diagnose(&self) -> DiagnosticResult;

    /// Attempt to fix what `diagnose` found. The default cannot fix anything.
    async fn repair(&self, result: DiagnosticResult) -> DiagnosticResult {
        result
    }

    async fn run(&self) -> DiagnosticResult {
        let result = self.diagnose().await;
        if !result.failed() {
            return result;
        }
        info!(target: "hive.worker.diagnostic", name = self.name(), message = %result.message, "diagnostic failed, attempting repair");
        self.repair(result).await
    }
}

/// The diagnostics configured for one platform.
pub struct DiagnosticRunner {
    platform: String,
    diagnostics: Vec<Box<dyn Diagnostic>>,
}

impl DiagnosticRunner {
    pub fn new(platform: impl Into<String>, diagnostics: Vec<Box<dyn Diagnostic>>) -> Self {
        Self {
            platform: platform.into(),
            diagnostics,
        }
    }

    /// Build from `diagnostics.<platform>` in the configuration. `None` when unconfigured.
    pub fn from_config(platform: &str, cfg: &HiveConfig) -> Option<Self> {
        let Some(components) = cfg.diagnostics_for(platform) else {
            info!(target: "hive.worker.diagnostic", platform, "no diagnostic specified");
            return None;
        };
        let diagnostics = components
            .iter()
            .filter_map(|(component, settings)| {
                info!(target: "hive.worker.diagnostic", platform, component, "initializing diagnostic");
                let built = build(component, settings);
                if built.is_none() {
                    warn!(target: "hive.worker.diagnostic", platform, component, "unknown or misconfigured diagnostic");
                }
                built
            })
            .collect();
        Some(Self::new(platform, diagnostics))
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// `true` when no diagnostic failed after repair.
    pub async fn run(&self) -> bool {
        let mut failures = 0usize;
        for diagnostic in &self.diagnostics {
            let result = diagnostic.run().await;
            if result.failed() {
                warn!(target: "hive.worker.diagnostic", platform = %self.platform, name = diagnostic.name(), message = %result.message, "diagnostic failed");
                failures += 1;
            }
        }
        failures == 0
    }
}

fn build(component: &str, settings: &serde_json::Value) -> Option<Box<dyn Diagnostic>> {
    match component {
        "load" => LoadDiagnostic::from_settings(settings).map(|d| Box::new(d) as Box<dyn Diagnostic>),
        _ => None,
    }
}
