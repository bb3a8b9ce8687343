//! # Pencilbook Core
//!
//! Core traits and types shared by every pencilbook crate.
//!
//! Business rules are written as reducers: pure functions
//! `(State, Action, Environment) → (State, Effects)`. The reducer validates a
//! command, records the resulting domain events in state, and describes any
//! side effects (notifications, delayed follow-ups) as [`effect::Effect`]
//! values. Executing those effects is the runtime's job, never the reducer's.
//!
//! ## Core Concepts
//!
//! - **State**: the working set a reducer operates on
//! - **Action**: every input to a reducer (commands and the events they produce)
//! - **Reducer**: validation plus state transition, no I/O
//! - **Effect**: description of a side effect to run after the transition is committed
//! - **Environment**: injected dependencies (clock, collaborators)
//!
//! ## Example
//!
//! ```
//! use pencilbook_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: u32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!         }
//!         SmallVec::new()
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! let effects = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
//! assert_eq!(state.count, 1);
//! assert!(effects.is_empty());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Record versions for optimistic concurrency control
pub mod version;

/// Validation and state transition
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Business logic for one kind of record
    ///
    /// A reducer never performs I/O. Anything it needs from outside (time,
    /// configuration, collaborators) arrives through `Environment`.
    pub trait Reducer {
        /// Working set mutated in place
        type State;

        /// Commands plus the events they produce
        type Action;

        /// Injected dependencies
        type Environment;

        /// Validate `action`, apply what it produces to `state`, and describe
        /// follow-up work as effects
        ///
        /// Most reducers produce zero to two effects, so the inline capacity
        /// of four avoids a heap allocation on the hot path.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effects as values
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// A side effect to be executed later
    ///
    /// Reducers return effects without running them. They are descriptions of what
    /// should happen, returned from reducers and executed by the runtime once
    /// the state transition that produced them has been persisted.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Concurrently
        Parallel(Vec<Effect<Action>>),

        /// One after another, in order
        Sequential(Vec<Effect<Action>>),

        /// Delayed action
        Delay {
            /// Wait before yielding the action
            duration: Duration,
            /// Fed back once the wait ends
            action: Box<Action>,
        },

        /// Async work, optionally yielding a follow-up action
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Futures have no Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap a future that produces no feedback action
        pub fn fire_and_forget<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                future.await;
                None
            }))
        }

        /// Whether this effect does nothing when executed
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Delay { .. } | Effect::Future(_) => false,
            }
        }
    }
}

/// Injected dependencies shared across reducers
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time
    ///
    /// Hold expiry, sweep cutoffs and audit timestamps all read time through
    /// this trait so tests can travel through a 48-hour hold window instantly.
    pub trait Clock: Send + Sync {
        /// Now, in UTC
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
