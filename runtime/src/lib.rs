//! # Evento Runtime
//!
//! Executes the effects returned by reducers and feeds the actions they
//! produce back into the reducer until nothing is left to do.
//!
//! ## Core Components
//!
//! - **`EffectRunner`**: request-scoped feedback loop over a caller-owned state
//! - **Retry**: exponential backoff for calls to flaky services
//! - **Metrics**: Prometheus recorder setup shared by the binaries
//!
//! ## Example
//!
//! ```ignore
//! use evento_runtime::EffectRunner;
//!
//! let runner = EffectRunner::new(CompraReducer::new(), environment);
//! let mut state = CompraState::for_usuario(usuario);
//!
//! runner.send(&mut state, CompraAction::Cancelar).await?;
//!
//! if let Some(error) = state.last_error {
//!     // map to a response
//! }
//! ```

use evento_core::{effect::Effect, reducer::Reducer};
use std::collections::VecDeque;

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while driving a reducer
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum RuntimeError {
        /// The feedback loop did not settle
        ///
        /// A reducer that keeps producing actions would otherwise run forever.
        #[error("reducer did not settle after {limit} actions")]
        StepLimit {
            /// Actions processed before giving up
            limit: usize,
        },
    }
}

pub use error::RuntimeError;

/// Default bound on actions processed per [`EffectRunner::send`].
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Drives a reducer over a state owned by the caller.
///
/// Unlike a long-lived store, the runner does not hold the state: a service
/// loads it, lets the runner process one command and every action its effects
/// feed back, then reads the outcome. Effects run on the calling task, so
/// [`send`](Self::send) returns only once the state has settled.
#[derive(Clone)]
pub struct EffectRunner<R>
where
    R: Reducer,
{
    reducer: R,
    environment: R::Environment,
    max_steps: usize,
}

impl<R> EffectRunner<R>
where
    R: Reducer,
    R::Action: Send + 'static,
{
    /// Create a runner for a reducer and its environment.
    #[must_use]
    pub const fn new(reducer: R, environment: R::Environment) -> Self {
        Self {
            reducer,
            environment,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the bound on actions processed per [`send`](Self::send).
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// The injected environment.
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Process `action` and everything its effects produce.
    ///
    /// Returns the number of actions the reducer processed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::StepLimit`] when the feedback loop does not
    /// settle within the configured bound. The state keeps whatever the
    /// processed actions left in it.
    #[tracing::instrument(skip_all, name = "runtime_send")]
    pub async fn send(&self, state: &mut R::State, action: R::Action) -> Result<usize, RuntimeError> {
        let mut queue = VecDeque::from([action]);
        let mut steps = 0;

        while let Some(action) = queue.pop_front() {
            if steps >= self.max_steps {
                tracing::error!(limit = self.max_steps, "Reducer did not settle");
                return Err(RuntimeError::StepLimit {
                    limit: self.max_steps,
                });
            }
            steps += 1;

            let effects = self.reducer.reduce(state, action, &self.environment);
            for effect in effects {
                queue.extend(execute(effect).await);
            }
        }

        tracing::trace!(steps, "Reducer settled");
        Ok(steps)
    }
}

/// Run one effect to completion and return the action it produced, if any.
async fn execute<A>(effect: Effect<A>) -> Option<A> {
    match effect {
        Effect::None => {
            ::metrics::counter!("runtime.effects.executed", "type" => "none").increment(1);
            None
        },
        Effect::Future(fut) => {
            ::metrics::counter!("runtime.effects.executed", "type" => "future").increment(1);
            let produced = fut.await;
            if produced.is_none() {
                tracing::trace!("Effect::Future completed with no action");
            }
            produced
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use evento_core::{SmallVec, smallvec};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, Default)]
    struct TallyState {
        total: i64,
        log: Vec<&'static str>,
    }

    #[derive(Clone, Debug)]
    enum TallyAction {
        Add(i64),
        Fetch,
        Fetched(i64),
        Twice,
        Silent,
        Forever,
    }

    #[derive(Clone)]
    struct TallyEnv {
        fetches: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Environment = TallyEnv;

        fn reduce(
            &self,
            state: &mut TallyState,
            action: TallyAction,
            env: &TallyEnv,
        ) -> SmallVec<[Effect<TallyAction>; 4]> {
            match action {
                TallyAction::Add(n) => {
                    state.total += n;
                    state.log.push("add");
                    SmallVec::new()
                },
                TallyAction::Fetch => {
                    let fetches = Arc::clone(&env.fetches);
                    smallvec![Effect::Future(Box::pin(async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        Some(TallyAction::Fetched(10))
                    }))]
                },
                TallyAction::Fetched(n) => {
                    state.log.push("fetched");
                    smallvec![Effect::Future(Box::pin(async move { Some(TallyAction::Add(n)) }))]
                },
                TallyAction::Twice => smallvec![
                    Effect::future(async { Some(TallyAction::Add(1)) }),
                    Effect::None,
                    Effect::future(async { Some(TallyAction::Add(2)) }),
                ],
                TallyAction::Silent => {
                    state.log.push("silent");
                    smallvec![Effect::future(async { None })]
                },
                TallyAction::Forever => {
                    smallvec![Effect::Future(Box::pin(async { Some(TallyAction::Forever) }))]
                },
            }
        }
    }

    fn runner() -> EffectRunner<TallyReducer> {
        EffectRunner::new(
            TallyReducer,
            TallyEnv {
                fetches: Arc::new(AtomicUsize::new(0)),
            },
        )
    }

    #[tokio::test]
    async fn feeds_effect_results_back_until_settled() {
        let runner = runner();
        let mut state = TallyState::default();

        let steps = runner.send(&mut state, TallyAction::Fetch).await.unwrap();

        assert_eq!(steps, 3);
        assert_eq!(state.total, 10);
        assert_eq!(state.log, vec!["fetched", "add"]);
        assert_eq!(runner.environment().fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_effect_of_a_step_is_fed_back_in_order() {
        let mut state = TallyState::default();
        let steps = runner().send(&mut state, TallyAction::Twice).await.unwrap();
        assert_eq!(steps, 3);
        assert_eq!(state.total, 3);
        assert_eq!(state.log, vec!["add", "add"]);
    }

    #[tokio::test]
    async fn effect_without_follow_up_ends_the_loop() {
        let mut state = TallyState::default();
        let steps = runner().send(&mut state, TallyAction::Silent).await.unwrap();
        assert_eq!(steps, 1);
        assert_eq!(state.log, vec!["silent"]);
    }

    #[tokio::test]
    async fn runaway_loop_hits_the_step_limit() {
        let runner = runner().with_max_steps(5);
        let mut state = TallyState::default();

        let result = runner.send(&mut state, TallyAction::Forever).await;

        assert_eq!(result, Err(RuntimeError::StepLimit { limit: 5 }));
    }
}
