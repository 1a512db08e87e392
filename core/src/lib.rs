//! # Evento Core
//!
//! Domain model and functional core of the evento ticketing system.
//!
//! The purchase workflow is written as a reducer: a pure function that takes
//! the current purchase state and an action, mutates the state and returns
//! effect descriptions. Effects are executed by `evento-runtime`, and the
//! actions they produce are fed back into the reducer.
//!
//! ## Core Concepts
//!
//! - **State**: [`compra::CompraState`], the session, its event and held seats
//! - **Action**: [`compra::CompraAction`], buyer commands plus the results of I/O
//! - **Reducer**: [`reducer::Reducer`], `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: [`effect::Effect`], side effect descriptions (not execution)
//! - **Environment**: ports injected as trait objects ([`repository`], [`catedra`], [`disponibilidad`])
//!
//! ## Layout
//!
//! ```text
//! types ──────────► entities and value objects
//! catedra ────────► cátedra wire format + CatedraGateway port
//! disponibilidad ─► proxy snapshot + seat matrix builder + SeatFeed port
//! repository ─────► persistence and cache ports
//! compra ─────────► purchase session state machine (reducer)
//! ```

pub mod catedra;
pub mod compra;
pub mod disponibilidad;
pub mod repository;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - the core trait for business logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for CompraReducer {
    ///     type State = CompraState;
    ///     type Action = CompraAction;
    ///     type Environment = CompraEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut CompraState,
    ///         action: CompraAction,
    ///         env: &CompraEnvironment,
    ///     ) -> SmallVec<[Effect<CompraAction>; 4]> {
    ///         match action {
    ///             CompraAction::Cancelar => { /* ... */ }
    ///             _ => SmallVec::new(),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effects requested by reducers.
///
/// The runtime awaits each effect and feeds any produced action back into the
/// reducer. Port calls (cátedra, proxy, repositories, cache) are the only kind
/// of effect the purchase workflow needs.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// A port call whose outcome comes back as an action.
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Async computation; `Some(action)` is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::None => f.write_str("Effect::None"),
                Self::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wraps a future producing the follow-up action.
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(fut))
        }

        /// True for [`Effect::Future`].
        #[must_use]
        pub const fn is_future(&self) -> bool {
            matches!(self, Self::Future(_))
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
