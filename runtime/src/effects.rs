//! Effect execution.
//!
//! Reducers return effect descriptions; this module runs them. Feedback
//! actions produced by `Future` and `Delay` effects are collected and handed
//! back to the caller, which decides whether to dispatch them.

use futures::future::{BoxFuture, FutureExt, join_all};
use pencilbook_core::effect::Effect;

/// Execute a batch of effects and collect any feedback actions.
///
/// Top-level effects run sequentially in the order given. `Parallel` effects
/// are joined concurrently; `Sequential` effects run one after another.
pub async fn execute<A, I>(effects: I) -> Vec<A>
where
    A: Send + 'static,
    I: IntoIterator<Item = Effect<A>>,
{
    let mut feedback = Vec::new();
    for effect in effects {
        feedback.extend(run(effect).await);
    }
    feedback
}

fn run<A>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>>
where
    A: Send + 'static,
{
    async move {
        match effect {
            Effect::None => Vec::new(),
            Effect::Future(future) => future.await.into_iter().collect(),
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                vec![*action]
            },
            Effect::Sequential(effects) => {
                let mut feedback = Vec::new();
                for effect in effects {
                    feedback.extend(run(effect).await);
                }
                feedback
            },
            Effect::Parallel(effects) => {
                let count = effects.len();
                tracing::trace!(count, "Executing parallel effects");
                join_all(effects.into_iter().map(run))
                    .await
                    .into_iter()
                    .flatten()
                    .collect()
            },
        }
    }
    .boxed()
}
