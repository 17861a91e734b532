use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::de::{self, ServiceCount};

/// A stack definition on disk that is not necessarily running.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct StackSummary {
    pub name: String,
    #[serde(default, deserialize_with = "de::text_list")]
    pub services: Vec<String>,
    #[serde(default, deserialize_with = "de::ports")]
    pub ports: Vec<u16>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub urls: Vec<String>,
}

/// A stack currently deployed on the swarm. `services` is a count here,
/// not a name list: it comes from the orchestrator, not from the YAML file.
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct RunningStack {
    pub name: String,
    #[serde(default)]
    pub services: ServiceCount,
    #[serde(default, deserialize_with = "de::ports")]
    pub ports: Vec<u16>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub urls: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct StatusReport {
    #[serde(default)]
    pub running_stacks: Vec<RunningStack>,
    #[serde(default)]
    pub stacks: Vec<RunningStack>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Reply shared by deploy, remove, update, lab start/destroy and trivy scan.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ActionReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
}

impl ActionReply {
    pub fn output(&self) -> Option<&str> {
        non_blank(&self.output)
    }

    pub fn error(&self) -> Option<&str> {
        non_blank(&self.error)
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.trim().is_empty())
}

// --- Stack creation ---

#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateStackRequest {
    pub name: String,
    pub image: String,
    pub network: String,
    pub health_check: Option<String>,
    pub use_traefik: bool,
    pub traefik_domain: Option<String>,
    pub env_vars: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_database: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseRequest>,
    #[serde(rename = "enableCICD", skip_serializing_if = "std::ops::Not::not")]
    pub enable_cicd: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd: Option<PipelineRequest>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Default)]
pub struct DatabaseRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub git_clone_url: Option<String>,
    pub git_branch: String,
    pub build_command: String,
    pub dockerfile_path: String,
    pub docker_registry: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CreateStackReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub info: Option<AssignedPorts>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub deploy_output: Option<String>,
    #[serde(default)]
    pub jenkins: Option<PipelineResult>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct AssignedPorts {
    #[serde(rename = "containerPort", default, deserialize_with = "de::opt_text")]
    pub container_port: Option<String>,
    #[serde(rename = "publicPort", default, deserialize_with = "de::opt_text")]
    pub public_port: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PipelineResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub job_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// --- YAML editor ---

#[derive(Deserialize, Clone, Debug, Default)]
pub struct YamlReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub yaml: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct StackRef<'a> {
    pub stack: &'a str,
}

#[derive(Serialize, Debug)]
pub struct UpdateStackRequest<'a> {
    pub stack: &'a str,
    pub yaml: &'a str,
}

// --- Security ---

#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SonarSnapshot {
    #[serde(default, deserialize_with = "de::count")]
    pub bugs: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub vulnerabilities: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub code_smells: u64,
    #[serde(default, deserialize_with = "de::number")]
    pub coverage: f64,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub quality_gate: Option<String>,
    #[serde(default, deserialize_with = "de::text_list")]
    pub projects: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct SonarReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub metrics: SonarSnapshot,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Vulnerability {
    #[serde(default, deserialize_with = "de::opt_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub fixed_version: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct TrivySnapshot {
    #[serde(default, deserialize_with = "de::count")]
    pub critical: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub high: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub medium: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub low: u64,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub last_scan: Option<String>,
}

impl TrivySnapshot {
    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts { critical: self.critical, high: self.high, medium: self.medium, low: self.low }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct TrivyReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub metrics: TrivySnapshot,
}

#[derive(Serialize, Debug)]
pub struct ScanImageRequest<'a> {
    pub image: &'a str,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ScanResults {
    #[serde(default, deserialize_with = "de::count")]
    pub critical: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub high: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub medium: u64,
    #[serde(default, deserialize_with = "de::count")]
    pub low: u64,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ScanResults {
    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts { critical: self.critical, high: self.high, medium: self.medium, low: self.low }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ScanImageReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Option<ScanResults>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ScanRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub summary: serde_json::Value,
}

impl ScanRecord {
    /// One-line summary: strings verbatim, objects as `key: value` pairs.
    pub fn summary_text(&self) -> String {
        match &self.summary {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => format!("{}: {}", k, s),
                    other => format!("{}: {}", k, other),
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct HistoryReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub scans: Vec<ScanRecord>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Clean,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRÍTICO",
            Severity::High => "ALTO",
            Severity::Medium => "MÉDIO",
            Severity::Low => "BAIXO",
            Severity::Clean => "SEGURO",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Severity::Critical => "severity-critical",
            Severity::High => "severity-high",
            Severity::Medium => "severity-medium",
            Severity::Low => "severity-low",
            Severity::Clean => "severity-clean",
        }
    }

    /// Maps a free-text severity from a scanner entry.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Clean,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SeverityCounts {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn worst(&self) -> Severity {
        if self.critical > 0 {
            Severity::Critical
        } else if self.high > 0 {
            Severity::High
        } else if self.medium > 0 {
            Severity::Medium
        } else if self.low > 0 {
            Severity::Low
        } else {
            Severity::Clean
        }
    }
}
