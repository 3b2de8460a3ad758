//! Events a transport link produces, in the order the transport emitted them.

use crate::credentials::Credentials;

/// One received chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Transport address of the sender (e.g. `15550100@s.whatsapp.net`).
    pub sender_address: String,
    /// True for the service's own outbound messages echoed back by the transport.
    pub is_self_originated: bool,
    /// Message text; empty for media or other non-text messages.
    pub body_text: String,
}

/// Connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    /// Open and authenticated.
    Open,
    Close(DisconnectReason),
}

/// A connection-state change, optionally carrying a fresh pairing code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionUpdate {
    pub state: Option<ConnectionState>,
    pub qr: Option<String>,
}

/// Everything the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The transport rotated its key material; must be persisted.
    CredentialsUpdated(Credentials),
    ConnectionUpdate(ConnectionUpdate),
    Message(InboundEvent),
}

/// Why the transport closed the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The account unlinked this device. Stored credentials are no longer valid.
    LoggedOut,
    ConnectionLost,
    ConnectionClosed,
    ConnectionReplaced,
    BadSession,
    RestartRequired,
    Unknown(u16),
}

impl DisconnectReason {
    pub fn from_code(code: u16) -> Self {
        match code {
            401 => DisconnectReason::LoggedOut,
            408 => DisconnectReason::ConnectionLost,
            428 => DisconnectReason::ConnectionClosed,
            440 => DisconnectReason::ConnectionReplaced,
            500 => DisconnectReason::BadSession,
            515 => DisconnectReason::RestartRequired,
            other => DisconnectReason::Unknown(other),
        }
    }

    pub fn code(&self) -> u16 {
        match *self {
            DisconnectReason::LoggedOut => 401,
            DisconnectReason::ConnectionLost => 408,
            DisconnectReason::ConnectionClosed => 428,
            DisconnectReason::ConnectionReplaced => 440,
            DisconnectReason::BadSession => 500,
            DisconnectReason::RestartRequired => 515,
            DisconnectReason::Unknown(code) => code,
        }
    }

    /// Anything but an explicit logout keeps the credentials valid.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, DisconnectReason::LoggedOut)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DisconnectReason::LoggedOut => "logged out",
            DisconnectReason::ConnectionLost => "connection lost",
            DisconnectReason::ConnectionClosed => "connection closed",
            DisconnectReason::ConnectionReplaced => "connection replaced",
            DisconnectReason::BadSession => "bad session",
            DisconnectReason::RestartRequired => "restart required",
            DisconnectReason::Unknown(_) => "unknown",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_logout_is_terminal() {
        for code in [408, 428, 440, 500, 515, 503, 0] {
            assert!(
                DisconnectReason::from_code(code).is_resumable(),
                "code {} should be resumable",
                code
            );
        }
        assert!(!DisconnectReason::from_code(401).is_resumable());
    }

    #[test]
    fn codes_survive_mapping() {
        for code in [401, 408, 428, 440, 500, 515, 411] {
            assert_eq!(DisconnectReason::from_code(code).code(), code);
        }
        assert_eq!(DisconnectReason::from_code(411), DisconnectReason::Unknown(411));
    }

    #[test]
    fn display_names_reason_and_code() {
        assert_eq!(DisconnectReason::LoggedOut.to_string(), "logged out (401)");
        assert_eq!(DisconnectReason::Unknown(999).to_string(), "unknown (999)");
    }
}
