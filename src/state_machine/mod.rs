//! Lifecycle state machines
//!
//! One deterministic finite state machine per resource family. Transitions
//! are pure functions: `(State, Input) → (State, Output)`, with no side
//! effects. The Output of every family machine is the recomputed
//! legal-action list; the backend writes it onto the entity after each
//! transition, and clients discover legal next actions solely from that
//! list.

pub mod compute;
pub mod network;
pub mod storage;

/// Result of a state transition
pub type TransitionResult<S, O> = Result<(S, O), TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state via this input is not allowed
    #[error("invalid transition from {from} via {input}")]
    InvalidTransition { from: String, input: String },
}

/// Trait for finite state machines with typed states, inputs and outputs
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions
    type Output;

    /// Attempt to transition to a new state given an input
    fn transition(&self, input: &Self::Input) -> TransitionResult<Self, Self::Output>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two-state switch exercising the trait machinery itself.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Switch {
        Off,
        On,
    }

    #[derive(Clone)]
    enum Press {
        Toggle,
    }

    impl StateMachine for Switch {
        type Input = Press;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<Self, Self::Output> {
            match (self, input) {
                (Switch::Off, Press::Toggle) => Ok((Switch::On, ())),
                (Switch::On, Press::Toggle) => Ok((Switch::Off, ())),
            }
        }
    }

    #[test]
    fn test_transition_and_can_transition() {
        let switch = Switch::Off;
        assert!(switch.can_transition(&Press::Toggle));
        let (next, _) = switch.transition(&Press::Toggle).unwrap();
        assert_eq!(next, Switch::On);
    }
}
