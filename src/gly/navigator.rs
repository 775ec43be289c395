//! Screen transition table: `splash --timer--> login --verified session--> content`.

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Splash,
    Login,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    TimerElapsed,
    VerifiedSession,
}

impl Screen {
    #[must_use]
    pub const fn next(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Splash, Transition::TimerElapsed) => Some(Self::Login),
            (Self::Login, Transition::VerifiedSession) => Some(Self::Content),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Splash => "splash",
            Self::Login => "login",
            Self::Content => "content",
        }
    }
}

/// Tracks the visible screen and only follows edges of the transition table.
#[derive(Debug, Default)]
pub struct Navigator {
    current: Screen,
}

impl Navigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn current(&self) -> Screen {
        self.current
    }

    /// Apply a transition event. Returns the new screen, or `None` if the
    /// event has no edge from the current screen.
    pub fn apply(&mut self, transition: Transition) -> Option<Screen> {
        let next = self.current.next(transition)?;
        debug!(from = self.current.name(), to = next.name(), "navigate");
        self.current = next;
        Some(next)
    }

    /// Follow a `NavigateTo(target)` request if some transition leads there.
    pub fn navigate_to(&mut self, target: Screen) -> bool {
        let reachable = [Transition::TimerElapsed, Transition::VerifiedSession]
            .into_iter()
            .find(|transition| self.current.next(*transition) == Some(target));

        if let Some(transition) = reachable {
            self.apply(transition);
            true
        } else {
            warn!(
                from = self.current.name(),
                to = target.name(),
                "ignoring navigation without a transition"
            );
            false
        }
    }
}
