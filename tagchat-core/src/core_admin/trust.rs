//! Trust models for channel ownership

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the owner of a channel is determined
///
/// Chosen once per process from the deployment, never per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustModel {
    /// The viewing session is trusted to be the owner
    #[default]
    Direct,
    /// The earliest publisher on the channel owns it
    Provenance,
}

impl TrustModel {
    /// Pick the model from the deployment origin
    ///
    /// Origins containing "provenance" run the provenance model; every other
    /// deployment trusts the session directly.
    pub fn from_origin(origin: &str) -> Self {
        if origin.contains("provenance") {
            TrustModel::Provenance
        } else {
            TrustModel::Direct
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustModel::Direct => "direct",
            TrustModel::Provenance => "provenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(TrustModel::Direct),
            "provenance" => Some(TrustModel::Provenance),
            _ => None,
        }
    }
}

impl fmt::Display for TrustModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
