// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::common::{CalcError, Result};
use crate::engine::TaskDescriptor;

/// Where a worker gets tasks from and sends results to
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch a ready task, `None` when there is nothing to do
    async fn next_task(&self) -> Result<Option<TaskDescriptor>>;

    async fn submit(&self, task_id: &str, result: f64) -> Result<()>;

    /// Report that a task cannot produce a result
    async fn fail(&self, task_id: &str, reason: &str) -> Result<()>;
}

#[derive(Deserialize)]
struct TaskEnvelope {
    task: TaskDescriptor,
}

/// Talks to the orchestrator's `/internal/task` endpoint
pub struct HttpTaskSource {
    client: Client,
    endpoint: Url,
}

impl HttpTaskSource {
    pub fn new(base: &Url) -> Result<Self> {
        // join() replaces the last segment unless the path ends in '/'
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let endpoint = base
            .join("internal/task")
            .map_err(|e| CalcError::config(format!("invalid orchestrator URL {}: {}", base, e)))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn next_task(&self) -> Result<Option<TaskDescriptor>> {
        let response = self.client.get(self.endpoint.clone()).send().await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let envelope: TaskEnvelope = response.json().await?;
                Ok(Some(envelope.task))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CalcError::Other(format!(
                    "orchestrator returned {} for task fetch: {}",
                    status, body
                )))
            }
        }
    }

    async fn submit(&self, task_id: &str, result: f64) -> Result<()> {
        self.post(task_id, json!({ "id": task_id, "result": result }))
            .await
    }

    async fn fail(&self, task_id: &str, reason: &str) -> Result<()> {
        self.post(task_id, json!({ "id": task_id, "error": reason }))
            .await
    }
}

impl HttpTaskSource {
    async fn post(&self, task_id: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(CalcError::UnknownTask(task_id.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CalcError::Other(format!(
                    "orchestrator returned {} for task {}: {}",
                    status, task_id, body
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_base() {
        let base = Url::parse("http://orchestrator:8080").unwrap();
        let source = HttpTaskSource::new(&base).unwrap();
        assert_eq!(
            source.endpoint().as_str(),
            "http://orchestrator:8080/internal/task"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        for raw in ["http://h/prefix", "http://h/prefix/"] {
            let source = HttpTaskSource::new(&Url::parse(raw).unwrap()).unwrap();
            assert_eq!(source.endpoint().as_str(), "http://h/prefix/internal/task");
        }
    }

    #[test]
    fn test_envelope_decoding() {
        let raw = r#"{"task":{"id":"t1","arg1":3,"arg2":4.5,"operation":"*","operation_time_ms":10,"expression_id":"e1"}}"#;
        let envelope: TaskEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.task.id, "t1");
        assert_eq!(envelope.task.arg1, 3.0);
        assert_eq!(envelope.task.arg2, 4.5);
        assert_eq!(envelope.task.operation_time_ms, 10);
    }
}
