//! Stack creation form.
//!
//! The browser posts the form as ordered key/value pairs; environment rows
//! arrive as repeated `env_key`/`env_value` fields in row order.

use std::collections::BTreeMap;

use crate::core::domain::{CreateStackRequest, DatabaseRequest, PipelineRequest};
use crate::error::FormError;

pub const DEFAULT_NETWORK: &str = "devops-network";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvRow {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackForm {
    pub stack_name: String,
    pub docker_image: String,
    pub network: String,
    pub container_port: String,
    pub public_port: String,
    pub replicas: String,
    pub health_check: String,
    pub use_traefik: bool,
    pub traefik_domain: String,
    pub env_rows: Vec<EnvRow>,
    pub include_database: bool,
    pub database_type: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub enable_cicd: bool,
    pub git_clone_url: String,
    pub git_branch: String,
    pub build_command: String,
    pub dockerfile_path: String,
    pub docker_registry: String,
}

impl StackForm {
    /// Empty form with the single leading environment row.
    pub fn blank() -> Self {
        Self { env_rows: vec![EnvRow::default()], ..Default::default() }
    }

    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Self {
        let mut form = StackForm::default();
        let mut keys = Vec::new();
        let mut values = Vec::new();

        for (k, v) in pairs {
            let v = v.as_ref().to_string();
            match k.as_ref() {
                "stackName" => form.stack_name = v,
                "dockerImage" => form.docker_image = v,
                "network" => form.network = v,
                "containerPort" => form.container_port = v,
                "publicPort" => form.public_port = v,
                "replicas" => form.replicas = v,
                "healthCheck" => form.health_check = v,
                "useTraefik" => form.use_traefik = v == "on",
                "traefikDomain" => form.traefik_domain = v,
                "env_key" => keys.push(v),
                "env_value" => values.push(v),
                "includeDatabase" => form.include_database = v == "on",
                "databaseType" => form.database_type = v,
                "dbName" => form.db_name = v,
                "dbUser" => form.db_user = v,
                "dbPassword" => form.db_password = v,
                "enableCICD" => form.enable_cicd = v == "on",
                "gitCloneUrl" => form.git_clone_url = v,
                "gitBranch" => form.git_branch = v,
                "buildCommand" => form.build_command = v,
                "dockerfilePath" => form.dockerfile_path = v,
                "dockerRegistry" => form.docker_registry = v,
                _ => {}
            }
        }

        let rows = keys.len().max(values.len()).max(1);
        let mut keys = keys.into_iter();
        let mut values = values.into_iter();
        form.env_rows = (0..rows)
            .map(|_| EnvRow { key: keys.next().unwrap_or_default(), value: values.next().unwrap_or_default() })
            .collect();
        form
    }

    pub fn add_env_row(&mut self) {
        self.env_rows.push(EnvRow::default());
    }

    /// The leading row is fixed; only added rows can be removed.
    pub fn remove_env_row(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.env_rows.len() {
            return false;
        }
        self.env_rows.remove(index);
        true
    }

    /// Environment variables with both key and value present after trimming.
    pub fn env_vars(&self) -> BTreeMap<String, String> {
        self.env_rows
            .iter()
            .map(|r| (r.key.trim(), r.value.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn to_request(&self) -> Result<CreateStackRequest, FormError> {
        let name = self.stack_name.trim();
        if name.is_empty() {
            return Err(FormError::Missing("name"));
        }
        let image = self.docker_image.trim();
        if image.is_empty() {
            return Err(FormError::Missing("image"));
        }

        let database = self.include_database.then(|| DatabaseRequest {
            kind: present(&self.database_type),
            name: present(&self.db_name),
            user: present(&self.db_user),
            password: present(&self.db_password),
        });

        let cicd = self.enable_cicd.then(|| PipelineRequest {
            git_clone_url: present(&self.git_clone_url),
            git_branch: present(&self.git_branch).unwrap_or_else(|| DEFAULT_BRANCH.into()),
            build_command: self.build_command.clone(),
            dockerfile_path: present(&self.dockerfile_path).unwrap_or_else(|| DEFAULT_DOCKERFILE.into()),
            docker_registry: self.docker_registry.clone(),
        });

        Ok(CreateStackRequest {
            name: name.to_string(),
            image: image.to_string(),
            network: present(&self.network).unwrap_or_else(|| DEFAULT_NETWORK.into()),
            health_check: present(&self.health_check),
            use_traefik: self.use_traefik,
            traefik_domain: present(&self.traefik_domain),
            env_vars: self.env_vars(),
            container_port: integer("containerPort", &self.container_port)?,
            public_port: integer("publicPort", &self.public_port)?,
            replicas: integer("replicas", &self.replicas)?,
            include_database: self.include_database,
            database,
            enable_cicd: self.enable_cicd,
            cicd,
        })
    }
}

fn present(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

fn integer<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<Option<T>, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| FormError::NotANumber { field, value: raw.to_string() })
}
