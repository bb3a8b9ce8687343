//! Given-When-Then harness for reducers.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use pencilbook_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent reducer test.
///
/// Actions given to [`when_action`](Self::when_action) are reduced in order
/// against the same state. State assertions see the final state; effect
/// assertions see the effects of every action, concatenated.
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(PencilHoldReducer::new())
///     .with_env(env)
///     .given_state(state)
///     .when_action(PencilHoldAction::ConfirmHold { hold_id, user_id })
///     .then_state(|state| assert!(state.last_error.is_none()))
///     .then_effects(assertions::assert_has_future_effect)
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    actions: Vec<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Action>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue an action to reduce (When); may be called repeatedly
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the produced effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<R::Action>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, environment, or at least one action is
    /// missing, or if any assertion fails.
    #[allow(clippy::panic)] // Test harness reports misuse by panicking
    pub fn run(self) {
        let Some(mut state) = self.initial_state else {
            panic!("Initial state must be set with given_state()");
        };
        let Some(env) = self.environment else {
            panic!("Environment must be set with with_env()");
        };
        assert!(!self.actions.is_empty(), "At least one action must be set with when_action()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects.extend(self.reducer.reduce(&mut state, action, &env));
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use pencilbook_core::effect::Effect;

    /// Assert that nothing would happen when the effects run
    ///
    /// # Panics
    ///
    /// Panics if any effect does work.
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pencilbook_core::SmallVec;
    use smallvec::smallvec;

    #[derive(Clone, Debug)]
    struct GateState {
        open: bool,
        toggles: u32,
    }

    #[derive(Clone, Debug)]
    enum GateAction {
        Open,
        Close,
    }

    struct GateReducer;

    impl Reducer for GateReducer {
        type State = GateState;
        type Action = GateAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut GateState,
            action: GateAction,
            _env: &(),
        ) -> SmallVec<[Effect<GateAction>; 4]> {
            let open = matches!(action, GateAction::Open);
            if state.open == open {
                return SmallVec::new();
            }
            state.open = open;
            state.toggles += 1;
            smallvec![Effect::fire_and_forget(async {})]
        }
    }

    #[test]
    fn reduces_actions_in_order() {
        ReducerTest::new(GateReducer)
            .with_env(())
            .given_state(GateState { open: false, toggles: 0 })
            .when_action(GateAction::Open)
            .when_action(GateAction::Open)
            .when_action(GateAction::Close)
            .then_state(|state| {
                assert!(!state.open);
                assert_eq!(state.toggles, 2);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 2))
            .run();
    }

    #[test]
    fn noop_action_has_no_effects() {
        ReducerTest::new(GateReducer)
            .with_env(())
            .given_state(GateState { open: true, toggles: 0 })
            .when_action(GateAction::Open)
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn toggle_has_future_effect() {
        ReducerTest::new(GateReducer)
            .with_env(())
            .given_state(GateState { open: false, toggles: 0 })
            .when_action(GateAction::Open)
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }
}
