#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, loops not started
    Uninitialized,

    /// Sender and receiver loops running
    Connected,

    /// Connection closing
    Closing,

    /// Connection closed
    Closed,
}

impl ConnectionState {
    /// Check if connected
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }

    /// Validate transition
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        match (*self, next) {
            (ConnectionState::Uninitialized, ConnectionState::Connected) => true,
            (ConnectionState::Closing | ConnectionState::Closed, ConnectionState::Closing) => false,
            (_, ConnectionState::Closing) => true,
            (ConnectionState::Closing, ConnectionState::Closed) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ConnectionState::*;
        assert!(Uninitialized.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Closing));
        assert!(Uninitialized.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));

        assert!(!Closed.can_transition_to(Connected));
        assert!(!Closed.can_transition_to(Closing));
        assert!(!Connected.can_transition_to(Uninitialized));
    }
}
