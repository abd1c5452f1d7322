//! Write operations and how they reconcile with the query cache.
//!
//! A [`Mutation`] runs one write against the remote service and, on success,
//! applies its [`Operation`]'s reconciliation policy to the [`QueryCache`]:
//!
//! | Operation | On success |
//! |---|---|
//! | [`CreatePost`] | seed the new post by id, prepend it to the list |
//! | [`UpdatePost`] | invalidate the post by id and the list |
//! | [`DeletePost`] | remove the post by id, drop it from the list |
//!
//! A failed write leaves every cache entry untouched. There is no retry.
//!
//! # Example
//!
//! ```rust,ignore
//! use postboard::mutation::{CreatePost, Mutation};
//!
//! let create = Mutation::new(CreatePost, cache.clone());
//! let post = create
//!     .execute(request, move |input| {
//!         Box::pin(async move { api.create_post(&input, &credential).await })
//!     })
//!     .await?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{CreatePostRequest, Post, PostId, PostList};
use crate::query::{Fingerprint, QueryCache};

/// The state of the most recent execution of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Not yet started.
    Idle,
    /// Waiting for the remote service.
    Pending,
    /// Succeeded with a result.
    Success(T),
    /// Failed with an error.
    Error(Error),
}

impl<T> MutationState<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Callbacks around a mutation. Every hook defaults to doing nothing.
pub trait MutationHooks<I, O>: Send + Sync {
    /// Called before the remote call is made.
    fn on_mutate(&self, _input: &I) {}

    /// Called after the cache has been reconciled.
    fn on_success(&self, _input: &I, _output: &O) {}

    /// Called after a failed remote call.
    fn on_error(&self, _input: &I, _error: &Error) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<I, O> MutationHooks<I, O> for NoopHooks {}

/// A kind of write together with its cache reconciliation policy.
pub trait Operation: Send + Sync + 'static {
    type Input: Clone + Send + 'static;
    type Output: Clone + Send + 'static;

    /// Name used in logs.
    const NAME: &'static str;

    /// Brings the cache in line with a successful write.
    fn reconcile(&self, cache: &QueryCache, input: &Self::Input, output: &Self::Output);
}

/// `POST /auth/posts/add`
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatePost;

impl Operation for CreatePost {
    type Input = CreatePostRequest;
    type Output = Post;

    const NAME: &'static str = "create post";

    fn reconcile(&self, cache: &QueryCache, _input: &CreatePostRequest, post: &Post) {
        cache.seed(&Fingerprint::Post(post.id), post.clone());
        cache.update(&Fingerprint::PostList, |list: &PostList| list.prepended(post.clone()));
    }
}

/// `PUT /auth/posts/{id}`
///
/// Both entries are refetched rather than patched.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePost;

impl Operation for UpdatePost {
    type Input = Post;
    type Output = Post;

    const NAME: &'static str = "update post";

    fn reconcile(&self, cache: &QueryCache, input: &Post, _output: &Post) {
        cache.invalidate(&Fingerprint::Post(input.id));
        cache.invalidate(&Fingerprint::PostList);
    }
}

/// `DELETE /auth/posts/{id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeletePost;

impl Operation for DeletePost {
    type Input = PostId;
    type Output = ();

    const NAME: &'static str = "delete post";

    fn reconcile(&self, cache: &QueryCache, id: &PostId, _output: &()) {
        cache.remove(&Fingerprint::Post(*id));
        cache.update(&Fingerprint::PostList, |list: &PostList| list.without(*id));
    }
}

/// Executes writes of one [`Operation`] and tracks the latest outcome.
///
/// Cloning is cheap; clones share state and hooks. Executions are not
/// serialised, so the state reflects whichever execution transitioned last.
pub struct Mutation<Op: Operation> {
    operation: Op,
    cache: QueryCache,
    state: Arc<Mutex<MutationState<Op::Output>>>,
    hooks: Arc<dyn MutationHooks<Op::Input, Op::Output>>,
}

impl<Op: Operation> Mutation<Op> {
    pub fn new(operation: Op, cache: QueryCache) -> Self {
        Self {
            operation,
            cache,
            state: Arc::new(Mutex::new(MutationState::Idle)),
            hooks: Arc::new(NoopHooks),
        }
    }

    #[must_use]
    pub fn with_hooks<H>(mut self, hooks: H) -> Self
    where
        H: MutationHooks<Op::Input, Op::Output> + 'static,
    {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn state(&self) -> MutationState<Op::Output> {
        self.lock().clone()
    }

    /// Returns the state to [`MutationState::Idle`].
    pub fn reset(&self) {
        *self.lock() = MutationState::Idle;
    }

    /// Runs `mutator` with `input` and reconciles the cache on success.
    ///
    /// On failure the error is recorded, the error hook is called and the
    /// cache is left as it was. A call dropped before the remote call
    /// completes puts a still pending state back to [`MutationState::Idle`]
    /// and runs no further hook.
    pub async fn execute<F>(&self, input: Op::Input, mutator: F) -> Result<Op::Output>
    where
        F: FnOnce(Op::Input) -> BoxFuture<'static, Result<Op::Output>>,
    {
        *self.lock() = MutationState::Pending;
        self.hooks.on_mutate(&input);
        debug!(operation = Op::NAME, "Mutation started");

        let mut pending = PendingMutation {
            state: &self.state,
            operation: Op::NAME,
            armed: true,
        };
        let outcome = mutator(input.clone()).await;
        pending.armed = false;

        match outcome {
            Ok(output) => {
                self.operation.reconcile(&self.cache, &input, &output);
                *self.lock() = MutationState::Success(output.clone());
                self.hooks.on_success(&input, &output);
                info!(operation = Op::NAME, "Mutation succeeded");
                Ok(output)
            }
            Err(error) => {
                *self.lock() = MutationState::Error(error.clone());
                self.hooks.on_error(&input, &error);
                warn!(operation = Op::NAME, %error, "Mutation failed");
                Err(error)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, MutationState<Op::Output>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets a pending state to idle if dropped while armed.
struct PendingMutation<'a, T> {
    state: &'a Mutex<MutationState<T>>,
    operation: &'static str,
    armed: bool,
}

impl<T> Drop for PendingMutation<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_pending() {
            *state = MutationState::Idle;
        }
        debug!(operation = self.operation, "Mutation abandoned");
    }
}

impl<Op: Operation + Clone> Clone for Mutation<Op> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            cache: self.cache.clone(),
            state: Arc::clone(&self.state),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<Op> fmt::Debug for Mutation<Op>
where
    Op: Operation,
    Op::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("operation", &Op::NAME)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}
