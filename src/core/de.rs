//! Lenient decoders for backend payloads.
//!
//! The lab backend builds its JSON by hand: ports come back as numeric
//! strings, the running-stack service count is whatever `docker stack ls`
//! printed, and optional fields are sometimes `null`.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Text(s) => s,
        }
    }

    fn as_port(&self) -> Option<u16> {
        match self {
            Scalar::Int(n) => u16::try_from(*n).ok(),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().trim_end_matches('%').parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Int(n) => u64::try_from(*n).ok(),
            Scalar::Float(f) if *f >= 0.0 => Some(*f as u64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Port list; entries that are not valid ports are dropped.
pub fn ports<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u16>, D::Error> {
    let raw: Option<Vec<Scalar>> = Option::deserialize(d)?;
    Ok(raw.unwrap_or_default().iter().filter_map(Scalar::as_port).collect())
}

/// String list that tolerates `null` and non-string scalars.
pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw: Option<Vec<Scalar>> = Option::deserialize(d)?;
    Ok(raw.unwrap_or_default().into_iter().map(Scalar::into_text).collect())
}

/// Optional scalar rendered as text.
pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<Scalar> = Option::deserialize(d)?;
    Ok(raw.map(Scalar::into_text))
}

pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let raw: Option<Scalar> = Option::deserialize(d)?;
    Ok(raw.as_ref().and_then(Scalar::as_u64).unwrap_or(0))
}

pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw: Option<Scalar> = Option::deserialize(d)?;
    Ok(raw.as_ref().and_then(Scalar::as_f64).unwrap_or(0.0))
}

/// Service count of a running stack: a number when the orchestrator reported
/// one, otherwise the raw text (usually `N/A`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCount {
    Count(u32),
    Unknown(String),
}

impl Default for ServiceCount {
    fn default() -> Self {
        ServiceCount::Unknown("N/A".into())
    }
}

impl std::fmt::Display for ServiceCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceCount::Count(n) => write!(f, "{}", n),
            ServiceCount::Unknown(s) => f.write_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for ServiceCount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw: Option<Scalar> = Option::deserialize(d)?;
        Ok(match raw {
            None => ServiceCount::default(),
            Some(s) => match s.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(n) => ServiceCount::Count(n),
                None => ServiceCount::Unknown(s.into_text()),
            },
        })
    }
}
