//! Session lifecycle: the one authenticated transport connection, its readiness, and the
//! send surface the rest of the service uses.

mod manager;
mod status;

pub use manager::SessionManager;
pub use status::{render_pairing_artifact, Readiness, SessionStatus};

use crate::error::SendError;
use async_trait::async_trait;

/// Outbound send capability. Implemented by `SessionManager`; the reply classifier and the
/// webhook relay depend on this rather than on the manager itself.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, address: &str, text: &str) -> Result<(), SendError>;
}
