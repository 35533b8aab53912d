//! Protocol session state machine.
//!
//! Happy path: `Connecting -> Authenticating -> SelectingTarget ->
//! RegisteringEvents -> Ready`. Any live state may drop to `Failed` or
//! `Disconnected`; both are terminal. There are no other backward edges.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Opening the transport.
    Connecting,
    /// Submitting the stored query credential.
    Authenticating,
    /// Selecting the virtual server instance.
    SelectingTarget,
    /// Tuning the connection, registering notifications, first snapshot.
    RegisteringEvents,
    /// Forwarding commands and presence events.
    Ready,
    /// Torn down normally.
    Disconnected,
    /// Torn down after an error.
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::SelectingTarget => "selecting_target",
            Self::RegisteringEvents => "registering_events",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    fn next_on_happy_path(&self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Authenticating),
            Self::Authenticating => Some(Self::SelectingTarget),
            Self::SelectingTarget => Some(Self::RegisteringEvents),
            Self::RegisteringEvents => Some(Self::Ready),
            Self::Ready | Self::Disconnected | Self::Failed => None,
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.is_terminal() || self.next_on_happy_path() == Some(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn happy_path_advances_one_step_at_a_time() {
        assert!(Connecting.can_transition_to(Authenticating));
        assert!(RegisteringEvents.can_transition_to(Ready));
        assert!(!Connecting.can_transition_to(SelectingTarget));
        assert!(!Ready.can_transition_to(Connecting));
    }

    #[test]
    fn live_states_can_fail_or_disconnect() {
        for state in [Connecting, Authenticating, SelectingTarget, RegisteringEvents, Ready] {
            assert!(state.can_transition_to(Failed));
            assert!(state.can_transition_to(Disconnected));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        assert!(!Failed.can_transition_to(Disconnected));
        assert!(!Disconnected.can_transition_to(Failed));
        assert!(!Disconnected.can_transition_to(Connecting));
    }
}
