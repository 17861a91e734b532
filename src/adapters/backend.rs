use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::domain::{
    ActionReply, CreateStackReply, CreateStackRequest, HistoryReply, ScanImageReply, ScanImageRequest, SonarReply,
    StackRef, StackSummary, StatusReport, TrivyReply, UpdateStackRequest, YamlReply,
};
use crate::error::ApiError;

lazy_static! {
    static ref STACK_NAME: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Stack names end up in URL paths and shell commands on the backend.
pub fn validate_stack_name(name: &str) -> Result<&str, ApiError> {
    if STACK_NAME.is_match(name) {
        Ok(name)
    } else {
        Err(ApiError::InvalidStackName { name: name.to_string() })
    }
}

/// The lab management API the dashboard drives.
#[async_trait]
pub trait LabBackend: Send + Sync {
    async fn list_stacks(&self) -> Result<Vec<StackSummary>, ApiError>;
    async fn status(&self) -> Result<StatusReport, ApiError>;
    async fn create_stack(&self, request: &CreateStackRequest) -> Result<CreateStackReply, ApiError>;
    async fn deploy(&self, stack: &str) -> Result<ActionReply, ApiError>;
    async fn remove(&self, stack: &str) -> Result<ActionReply, ApiError>;
    async fn stack_yaml(&self, stack: &str) -> Result<YamlReply, ApiError>;
    async fn update_stack(&self, stack: &str, yaml: &str) -> Result<ActionReply, ApiError>;
    async fn start_lab(&self) -> Result<ActionReply, ApiError>;
    async fn destroy_lab(&self) -> Result<ActionReply, ApiError>;
    async fn sonarqube(&self) -> Result<SonarReply, ApiError>;
    async fn trivy(&self) -> Result<TrivyReply, ApiError>;
    async fn trivy_scan(&self) -> Result<ActionReply, ApiError>;
    async fn scan_image(&self, image: &str) -> Result<ScanImageReply, ApiError>;
    async fn scan_history(&self) -> Result<HistoryReply, ApiError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::BadBaseUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BadBaseUrl(base_url.to_string()));
        }
        Ok(Self { client: Client::new(), base })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments);
        debug!(event = "BACKEND_REQUEST", method = "GET", url = %url, "Calling backend");
        let resp = self.client.get(url.clone()).send().await?;
        decode(url, resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(segments);
        debug!(event = "BACKEND_REQUEST", method = "POST", url = %url, "Calling backend");
        let mut req = self.client.post(url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        decode(url, resp).await
    }
}

/// Error statuses still carry a JSON body with `success: false`, so the body
/// is decoded regardless of the status code.
async fn decode<T: DeserializeOwned>(url: Url, resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!(event = "BACKEND_DECODE_FAIL", url = %url, status = %status, error = %e, "Backend reply is not the expected JSON");
        ApiError::Decode { endpoint: url.path().to_string(), reason: format!("HTTP {}: {}", status, e) }
    })
}

#[async_trait]
impl LabBackend for HttpBackend {
    async fn list_stacks(&self) -> Result<Vec<StackSummary>, ApiError> {
        self.get(&["api", "stacks"]).await
    }

    async fn status(&self) -> Result<StatusReport, ApiError> {
        self.get(&["api", "status"]).await
    }

    async fn create_stack(&self, request: &CreateStackRequest) -> Result<CreateStackReply, ApiError> {
        validate_stack_name(&request.name)?;
        self.post(&["api", "create-stack"], Some(request)).await
    }

    async fn deploy(&self, stack: &str) -> Result<ActionReply, ApiError> {
        let stack = validate_stack_name(stack)?;
        self.post(&["api", "deploy"], Some(&StackRef { stack })).await
    }

    async fn remove(&self, stack: &str) -> Result<ActionReply, ApiError> {
        let stack = validate_stack_name(stack)?;
        self.post(&["api", "remove"], Some(&StackRef { stack })).await
    }

    async fn stack_yaml(&self, stack: &str) -> Result<YamlReply, ApiError> {
        let stack = validate_stack_name(stack)?;
        self.get(&["api", "stack-yaml", stack]).await
    }

    async fn update_stack(&self, stack: &str, yaml: &str) -> Result<ActionReply, ApiError> {
        let stack = validate_stack_name(stack)?;
        self.post(&["api", "update-stack"], Some(&UpdateStackRequest { stack, yaml })).await
    }

    async fn start_lab(&self) -> Result<ActionReply, ApiError> {
        self.post::<(), _>(&["api", "lab", "start"], None).await
    }

    async fn destroy_lab(&self) -> Result<ActionReply, ApiError> {
        self.post::<(), _>(&["api", "lab", "destroy"], None).await
    }

    async fn sonarqube(&self) -> Result<SonarReply, ApiError> {
        self.get(&["api", "security", "sonarqube"]).await
    }

    async fn trivy(&self) -> Result<TrivyReply, ApiError> {
        self.get(&["api", "security", "trivy"]).await
    }

    async fn trivy_scan(&self) -> Result<ActionReply, ApiError> {
        self.post::<(), _>(&["api", "security", "trivy", "scan"], None).await
    }

    async fn scan_image(&self, image: &str) -> Result<ScanImageReply, ApiError> {
        self.post(&["api", "security", "trivy", "scan-image"], Some(&ScanImageRequest { image })).await
    }

    async fn scan_history(&self) -> Result<HistoryReply, ApiError> {
        self.get(&["api", "security", "history"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_names_are_restricted() {
        assert!(validate_stack_name("jenkins-ci_2").is_ok());
        assert!(validate_stack_name("").is_err());
        assert!(validate_stack_name("../etc").is_err());
        assert!(validate_stack_name("a b").is_err());
    }

    #[test]
    fn urls_join_onto_base_path() {
        let backend = HttpBackend::new("http://lab.local:5000/").unwrap();
        assert_eq!(backend.url(&["api", "stacks"]).as_str(), "http://lab.local:5000/api/stacks");

        let nested = HttpBackend::new("http://lab.local/panel").unwrap();
        assert_eq!(
            nested.url(&["api", "stack-yaml", "wiki"]).as_str(),
            "http://lab.local/panel/api/stack-yaml/wiki"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(HttpBackend::new("mailto:ops@lab.local").is_err());
        assert!(HttpBackend::new("not a url").is_err());
    }
}
