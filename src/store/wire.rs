/// Request and response bodies of the record store HTTP API
///
/// Shared by `HttpStore` and the mock server so both sides agree on shape.

use crate::store::Filter;
use crate::subscription::ChangeEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// PATCH /rest/{table}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub filter: Filter,
    pub patch: Value,
}

/// POST /rest/{table}/{id}/cas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasRequest {
    pub field: String,
    pub expected: Value,
    pub new: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasResponse {
    pub swapped: bool,
}

/// GET /changes?after={seq}&limit={n}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub after: u64,
    #[serde(default = "default_changes_limit")]
    pub limit: usize,
}

fn default_changes_limit() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub events: Vec<ChangeEvent>,
    /// Sequence number of the newest change known to the store
    pub latest_seq: u64,
}

/// Error body returned with any non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
