use std::fmt;

/// Lifecycle of the single duplex connection. `Closed` is terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    #[inline]
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
