use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request-scoped identity handed in by the auth collaborator. The core
/// trusts it and never performs authentication itself; passing it explicitly
/// keeps every operation free of ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub user_id: Uuid,
}

impl RequestIdentity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
