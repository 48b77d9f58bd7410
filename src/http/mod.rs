pub mod forward;
pub mod routes;

use serde::{Deserialize, Serialize};

pub use forward::{HttpPeerClient, PeerClient};
pub use routes::{router, ApiState, JobStatusBody};

/// JSON body carried on every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
