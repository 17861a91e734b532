//! Error types shared by the backend adapter and the controller.
//!
//! Application errors (`success: false` with a server message) are not errors
//! here: they travel inside the reply bodies. `ApiError` only covers requests
//! that never produced a usable reply.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("resposta inválida de {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("nome de stack inválido: {name}")]
    InvalidStackName { name: String },

    #[error("URL do backend inválida: {0}")]
    BadBaseUrl(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("Campo obrigatório: {0}")]
    Missing(&'static str),

    #[error("Valor inválido para {field}: {value}")]
    NotANumber { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("falha ao acessar preferências: {0}")]
    Io(#[from] std::io::Error),

    #[error("preferências corrompidas: {0}")]
    Format(#[from] serde_json::Error),
}
