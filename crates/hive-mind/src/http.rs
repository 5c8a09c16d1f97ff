use std::{path::Path, time::Duration};

use async_trait::async_trait;
use hive_core::{Mind, MindError, config::NetworkConfig};
use hive_model::{
    DeviceDetails, Job, JobId, QueueName, RegisteredDevice, ReservationDetails, Statistic,
};
use reqwest::{
    RequestBuilder, StatusCode,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, trace};

/// JSON-over-HTTP client. Device calls go to the registry, job calls to the scheduler.
#[derive(Debug, Clone)]
pub struct HttpMind {
    client: reqwest::Client,
    mind: Option<String>,
    scheduler: Option<String>,
}

impl HttpMind {
    pub fn new(cfg: &NetworkConfig) -> Result<Self, MindError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout.max(1)))
            .build()
            .map_err(|e| MindError::Request(e.to_string()))?;
        Ok(Self {
            client,
            mind: cfg.hive_mind.as_deref().map(trim_base),
            scheduler: cfg.scheduler.as_deref().map(trim_base),
        })
    }

    fn mind_url(&self, path: &str) -> Result<String, MindError> {
        self.mind
            .as_ref()
            .map(|base| format!("{base}{path}"))
            .ok_or(MindError::Offline)
    }

    fn scheduler_url(&self, path: &str) -> Result<String, MindError> {
        self.scheduler
            .as_ref()
            .map(|base| format!("{base}{path}"))
            .ok_or(MindError::Offline)
    }

    async fn job_call(&self, job: &JobId, action: &str, body: impl Serialize) -> Result<(), MindError> {
        let url = self.scheduler_url(&format!("/api/jobs/{job}/{action}"))?;
        send(self.client.patch(url).json(&body)).await
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

async fn execute(req: RequestBuilder) -> Result<reqwest::Response, MindError> {
    let resp = req
        .send()
        .await
        .map_err(|e| MindError::Request(e.to_string()))?;
    trace!(target: "hive.mind.http", url = %resp.url(), status = %resp.status(), "response");
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(MindError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn send(req: RequestBuilder) -> Result<(), MindError> {
    execute(req).await.map(|_| ())
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, MindError> {
    let body = execute(req)
        .await?
        .text()
        .await
        .map_err(|e| MindError::Request(e.to_string()))?;
    serde_json::from_str(&body)
        .map_err(|e| MindError::InvalidResponse(format!("{e}, body: {body}")))
}

#[async_trait]
impl Mind for HttpMind {
    async fn register(&self, details: &DeviceDetails) -> Result<RegisteredDevice, MindError> {
        let url = self.mind_url("/api/devices/register")?;
        send_json(self.client.post(url).json(&json!({ "device": details }))).await
    }

    async fn update_os_version(&self, device_id: &str, version: &str) -> Result<(), MindError> {
        let url = self.mind_url(&format!("/api/devices/{device_id}/os_version"))?;
        send(self.client.put(url).json(&json!({ "version": version }))).await
    }

    async fn poll(&self, device_ids: &[String]) -> Result<(), MindError> {
        let url = self.mind_url("/api/devices/poll")?;
        send(self.client.put(url).json(&json!({ "devices": device_ids }))).await
    }

    async fn hive_queues(&self, device_id: &str) -> Result<Vec<QueueName>, MindError> {
        let url = self.mind_url(&format!("/api/devices/{device_id}/hive_queues"))?;
        send_json(self.client.get(url)).await
    }

    async fn reserve_job(
        &self,
        queues: &[QueueName],
        details: &ReservationDetails,
    ) -> Result<Option<Job>, MindError> {
        let url = self.scheduler_url("/api/jobs/reserve")?;
        let body = json!({ "queues": queues, "reservation_details": details });
        let resp = execute(self.client.patch(url).json(&body)).await;
        let resp = match resp {
            Err(MindError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None);
            }
            other => other?,
        };
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| MindError::Request(e.to_string()))?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        debug!(target: "hive.mind.http", %body, "reserved job");
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| MindError::InvalidResponse(format!("{e}, body: {body}")))
    }

    async fn push_statistics(&self, device_id: &str, stats: &[Statistic]) -> Result<(), MindError> {
        let url = self.mind_url("/api/device_statistics/upload")?;
        let body = json!({ "device_id": device_id, "statistics": stats });
        send(self.client.post(url).json(&body)).await
    }

    async fn clear_logs(&self, device_id: &str, component: &str, level: &str) -> Result<(), MindError> {
        let url = self.mind_url(&format!("/api/devices/{device_id}/clear_logs"))?;
        let body = json!({ "component": component, "level": level });
        send(self.client.post(url).json(&body)).await
    }

    async fn prepare_job(&self, job: &JobId, device_id: &str) -> Result<(), MindError> {
        self.job_call(job, "prepare", json!({ "device_id": device_id })).await
    }

    async fn start_job(&self, job: &JobId) -> Result<(), MindError> {
        self.job_call(job, "start", json!({})).await
    }

    async fn end_job(&self, job: &JobId, exit_code: Option<i32>) -> Result<(), MindError> {
        self.job_call(job, "end", json!({ "exit_value": exit_code })).await
    }

    async fn complete_job(&self, job: &JobId) -> Result<(), MindError> {
        self.job_call(job, "complete", json!({})).await
    }

    async fn error_job(&self, job: &JobId, message: &str) -> Result<(), MindError> {
        self.job_call(job, "error", json!({ "message": message })).await
    }

    async fn report_artifact(&self, job: &JobId, path: &Path) -> Result<(), MindError> {
        let url = self.scheduler_url(&format!("/api/jobs/{job}/artifacts"))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MindError::Request(format!("cannot read artifact {}: {e}", path.display())))?;
        debug!(target: "hive.mind.http", file = %name, size = bytes.len(), "uploading artifact");
        let form = Form::new()
            .text("name", name.clone())
            .part("file", Part::bytes(bytes).file_name(name));
        send(self.client.post(url).multipart(form)).await
    }
}
