//! MLflow tracking server client (REST API 2.0, blocking).
//!
//! One `log_run` call:
//! 1. resolves the experiment by name, creating it when absent
//! 2. creates a run
//! 3. logs params and metrics in one batch
//! 4. uploads the model through the `mlflow-artifacts` proxy
//! 5. marks the run `FINISHED`, or `FAILED` if step 3 or 4 failed

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::{ExperimentTracker, TrackedRun, TrackerError, MODEL_ARTIFACT_PATH};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACT_PROXY_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";
const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: Run,
}

#[derive(Debug, Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
    artifact_uri: String,
}

pub struct MlflowTracker {
    client: Client,
    base_url: String,
    experiment_name: String,
}

impl MlflowTracker {
    pub fn new(tracking_uri: &str, experiment_name: &str) -> Result<Self, TrackerError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: tracking_uri.trim_end_matches('/').to_string(),
            experiment_name: experiment_name.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{API_PREFIX}/{method}", self.base_url)
    }

    /// Proxy upload URL for a run artifact.
    ///
    /// Only `mlflow-artifacts:` URIs can be uploaded over HTTP.
    pub fn artifact_upload_url(
        &self,
        artifact_uri: &str,
        relative_path: &str,
    ) -> Result<String, TrackerError> {
        let rest = artifact_uri
            .strip_prefix(ARTIFACT_SCHEME)
            .ok_or_else(|| TrackerError::UnsupportedArtifactUri(artifact_uri.to_string()))?;
        // Either `mlflow-artifacts:/<path>` or `mlflow-artifacts://host/<path>`.
        let path = match rest.strip_prefix("//") {
            Some(with_host) => with_host.split_once('/').map_or("", |(_, p)| p),
            None => rest.trim_start_matches('/'),
        };
        let path = path.trim_end_matches('/');
        Ok(format!(
            "{}/{ARTIFACT_PROXY_PREFIX}/{path}/{relative_path}",
            self.base_url
        ))
    }

    fn experiment_id(&self) -> Result<String, TrackerError> {
        let resp = self
            .client
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", self.experiment_name.as_str())])
            .send()?;

        if resp.status().is_success() {
            let body: GetExperimentResponse = resp.json()?;
            return Ok(body.experiment.experiment_id);
        }

        let status = resp.status().as_u16();
        let body = resp.text()?;
        let missing = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error_code == "RESOURCE_DOES_NOT_EXIST")
            .unwrap_or(false);
        if !missing {
            return Err(TrackerError::Api { status, body });
        }

        info!(experiment = %self.experiment_name, "creating experiment");
        let created: CreateExperimentResponse = check(
            self.client
                .post(self.endpoint("experiments/create"))
                .json(&json!({ "name": self.experiment_name }))
                .send()?,
        )?
        .json()?;
        Ok(created.experiment_id)
    }

    fn create_run(&self, experiment_id: &str, run_name: &str) -> Result<RunInfo, TrackerError> {
        let resp: CreateRunResponse = check(
            self.client
                .post(self.endpoint("runs/create"))
                .json(&json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": now_millis(),
                    "tags": [{ "key": "mlflow.runName", "value": run_name }],
                }))
                .send()?,
        )?
        .json()?;
        Ok(resp.run.info)
    }

    fn log_batch(&self, run_id: &str, run: &TrackedRun) -> Result<(), TrackerError> {
        let timestamp = now_millis();
        let params: Vec<_> = run
            .params
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v }))
            .collect();
        let metrics: Vec<_> = run
            .metrics
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": timestamp, "step": 0 }))
            .collect();
        check(
            self.client
                .post(self.endpoint("runs/log-batch"))
                .json(&json!({ "run_id": run_id, "params": params, "metrics": metrics }))
                .send()?,
        )?;
        Ok(())
    }

    fn upload_model(&self, info: &RunInfo, model_json: &str) -> Result<(), TrackerError> {
        let url = self.artifact_upload_url(&info.artifact_uri, MODEL_ARTIFACT_PATH)?;
        check(
            self.client
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(model_json.to_string())
                .send()?,
        )?;
        Ok(())
    }

    fn finish_run(&self, run_id: &str, status: &str) -> Result<(), TrackerError> {
        check(
            self.client
                .post(self.endpoint("runs/update"))
                .json(&json!({ "run_id": run_id, "status": status, "end_time": now_millis() }))
                .send()?,
        )?;
        Ok(())
    }
}

impl ExperimentTracker for MlflowTracker {
    fn name(&self) -> &str {
        "mlflow"
    }

    fn log_run(&self, run: &TrackedRun) -> Result<String, TrackerError> {
        let experiment_id = self.experiment_id()?;
        let info = self.create_run(&experiment_id, &run.run_name)?;

        let logged = self
            .log_batch(&info.run_id, run)
            .and_then(|()| self.upload_model(&info, &run.model_json));

        match logged {
            Ok(()) => {
                self.finish_run(&info.run_id, "FINISHED")?;
                info!(run_id = %info.run_id, experiment_id = %experiment_id, "mlflow run finished");
                Ok(info.run_id)
            }
            Err(err) => {
                if let Err(update_err) = self.finish_run(&info.run_id, "FAILED") {
                    warn!(run_id = %info.run_id, error = %update_err, "could not mark run failed");
                }
                Err(err)
            }
        }
    }
}

fn check(resp: Response) -> Result<Response, TrackerError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    Err(TrackerError::Api { status, body })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
