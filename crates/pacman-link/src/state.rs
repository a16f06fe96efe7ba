use std::fmt;

use crate::error::{LinkError, Result};

/// Lifecycle of a link.
///
/// `Closed` is terminal. A failed connect attempt or handshake falls back
/// to `Disconnected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Streaming,
    Closed,
}

impl LinkState {
    /// Whether `self -> next` is a legal edge.
    pub fn can_transition(self, next: LinkState) -> bool {
        use LinkState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connecting)
                | (Connecting, Handshaking)
                | (Connecting, Disconnected)
                | (Handshaking, Streaming)
                | (Handshaking, Disconnected)
                | (Streaming, Disconnected)
                | (Disconnected | Connecting | Handshaking | Streaming, Closed)
        )
    }

    /// Move to `next`, or fail with [`LinkError::InvalidTransition`].
    pub fn transition(&mut self, next: LinkState) -> Result<()> {
        if !self.can_transition(next) {
            return Err(LinkError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!(from = %self, to = %next, "link state");
        *self = next;
        Ok(())
    }

    pub fn is_closed(self) -> bool {
        self == LinkState::Closed
    }

    pub const fn name(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Handshaking => "handshaking",
            LinkState::Streaming => "streaming",
            LinkState::Closed => "closed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = LinkState::default();
        for next in [
            LinkState::Connecting,
            LinkState::Handshaking,
            LinkState::Streaming,
            LinkState::Closed,
        ] {
            state.transition(next).expect("transition should be allowed");
        }
        assert!(state.is_closed());
    }

    #[test]
    fn retrying_connect_stays_connecting() {
        let mut state = LinkState::Connecting;
        state
            .transition(LinkState::Connecting)
            .expect("retry should be allowed");
        state
            .transition(LinkState::Disconnected)
            .expect("giving up should be allowed");
    }

    #[test]
    fn skipping_handshake_rejected() {
        let mut state = LinkState::Connecting;
        let err = state.transition(LinkState::Streaming).unwrap_err();
        assert!(matches!(
            err,
            LinkError::InvalidTransition {
                from: LinkState::Connecting,
                to: LinkState::Streaming
            }
        ));
        assert_eq!(state, LinkState::Connecting);
    }

    #[test]
    fn closed_is_terminal() {
        for next in [
            LinkState::Disconnected,
            LinkState::Connecting,
            LinkState::Handshaking,
            LinkState::Streaming,
            LinkState::Closed,
        ] {
            assert!(!LinkState::Closed.can_transition(next));
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(LinkState::Handshaking.to_string(), "handshaking");
        let mut state = LinkState::Closed;
        let err = state.transition(LinkState::Streaming).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid link transition: closed -> streaming"
        );
    }
}
