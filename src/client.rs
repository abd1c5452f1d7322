//! The client context handed to presentation code.

use std::future::Future;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use tracing::info;

use crate::api::PostsApi;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::model::{
    CreatePostRequest, Credential, LoginRequest, Post, PostId, PostList, SearchParams, User,
};
use crate::mutation::{CreatePost, DeletePost, Mutation, MutationState, UpdatePost};
use crate::query::{CacheEntry, Fingerprint, QueryCache};
use crate::session::SessionStore;

/// Owns one session, one query cache and the post mutations.
///
/// Reads go through the cache, writes through a [`Mutation`] that reconciles
/// the cache afterwards. Every post operation needs a logged-in session and
/// fails with [`Error::Unauthenticated`](crate::Error::Unauthenticated) before
/// touching the network otherwise.
///
/// Cloning is cheap; clones share all state.
#[derive(Debug, Clone)]
pub struct PostsClient {
    api: PostsApi,
    session: SessionStore,
    cache: QueryCache,
    create: Mutation<CreatePost>,
    update: Mutation<UpdatePost>,
    delete: Mutation<DeletePost>,
}

impl PostsClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api = PostsApi::new(HttpClient::new(config)?);
        Ok(Self::with_parts(api, QueryCache::with_config(config.query.clone())))
    }

    pub fn with_parts(api: PostsApi, cache: QueryCache) -> Self {
        Self {
            create: Mutation::new(CreatePost, cache.clone()),
            update: Mutation::new(UpdatePost, cache.clone()),
            delete: Mutation::new(DeletePost, cache.clone()),
            session: SessionStore::new(),
            api,
            cache,
        }
    }

    pub const fn api(&self) -> &PostsApi {
        &self.api
    }

    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.session
            .login(&self.api, &LoginRequest::new(username, password))
            .await
    }

    /// Ends the session and drops everything cached under it.
    pub fn logout(&self) -> Result<()> {
        self.session.logout()?;
        self.cache.clear();
        info!("Cleared cache after logout");
        Ok(())
    }

    /// The cached post list, starting a fetch when needed.
    pub fn posts(&self) -> Result<CacheEntry<PostList>> {
        let fetcher =
            self.fetcher(|api, credential| async move { api.list_posts(&credential).await })?;
        Ok(self.cache.read(&Fingerprint::PostList, fetcher))
    }

    /// The post list once any fetch it needs has settled.
    pub async fn fetch_posts(&self) -> Result<CacheEntry<PostList>> {
        let fetcher =
            self.fetcher(|api, credential| async move { api.list_posts(&credential).await })?;
        Ok(self.cache.fetch(&Fingerprint::PostList, fetcher).await)
    }

    /// The post list now and after every change, refetching when invalidated.
    pub fn watch_posts(&self) -> Result<BoxStream<'static, CacheEntry<PostList>>> {
        let fetcher =
            self.fetcher(|api, credential| async move { api.list_posts(&credential).await })?;
        Ok(self.cache.watch(Fingerprint::PostList, fetcher))
    }

    pub fn search(&self, params: SearchParams) -> Result<CacheEntry<PostList>> {
        let fetcher = self.fetcher(move |api, credential| async move {
            api.search_posts(params, &credential).await
        })?;
        Ok(self.cache.read(&Fingerprint::PostSearch(params), fetcher))
    }

    pub async fn fetch_search(&self, params: SearchParams) -> Result<CacheEntry<PostList>> {
        let fetcher = self.fetcher(move |api, credential| async move {
            api.search_posts(params, &credential).await
        })?;
        Ok(self.cache.fetch(&Fingerprint::PostSearch(params), fetcher).await)
    }

    pub fn post(&self, id: PostId) -> Result<CacheEntry<Post>> {
        let fetcher =
            self.fetcher(move |api, credential| async move { api.get_post(id, &credential).await })?;
        Ok(self.cache.read(&Fingerprint::Post(id), fetcher))
    }

    pub async fn fetch_post(&self, id: PostId) -> Result<CacheEntry<Post>> {
        let fetcher =
            self.fetcher(move |api, credential| async move { api.get_post(id, &credential).await })?;
        Ok(self.cache.fetch(&Fingerprint::Post(id), fetcher).await)
    }

    /// Creates a post, then seeds it and prepends it to the cached list.
    pub async fn create_post(&self, request: CreatePostRequest) -> Result<Post> {
        let credential = self.session.credential()?;
        let api = self.api.clone();
        self.create
            .execute(request, move |input| {
                async move { api.create_post(&input, &credential).await }.boxed()
            })
            .await
    }

    /// Saves a post, then marks its cached copy and the list stale.
    pub async fn update_post(&self, post: Post) -> Result<Post> {
        let credential = self.session.credential()?;
        let api = self.api.clone();
        self.update
            .execute(post, move |input| {
                async move { api.update_post(&input, &credential).await }.boxed()
            })
            .await
    }

    /// Deletes a post, then drops it from the cache.
    pub async fn delete_post(&self, id: PostId) -> Result<()> {
        let credential = self.session.credential()?;
        let api = self.api.clone();
        self.delete
            .execute(id, move |input| {
                async move { api.delete_post(input, &credential).await }.boxed()
            })
            .await
    }

    pub fn create_state(&self) -> MutationState<Post> {
        self.create.state()
    }

    pub fn update_state(&self) -> MutationState<Post> {
        self.update.state()
    }

    pub fn delete_state(&self) -> MutationState<()> {
        self.delete.state()
    }

    /// Binds `call` to the API and the session.
    ///
    /// Fails right away without a credential. The returned fetcher looks the
    /// credential up again on every call, so a fetch started after logout
    /// fails with `Unauthenticated` instead of reaching the network.
    fn fetcher<V, F, Fut>(
        &self,
        call: F,
    ) -> Result<impl Fn() -> BoxFuture<'static, Result<V>> + Send + Sync + use<V, F, Fut>>
    where
        V: Send + 'static,
        F: Fn(PostsApi, Credential) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.session.credential()?;
        let api = self.api.clone();
        let session = self.session.clone();
        Ok(move || match session.credential() {
            Ok(credential) => call(api.clone(), credential).boxed(),
            Err(error) => future::err(error).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_requires_session() {
        let client = PostsClient::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap();

        assert_eq!(client.posts().unwrap_err(), Error::Unauthenticated);
        assert_eq!(client.fetch_post(1).await.unwrap_err(), Error::Unauthenticated);
        assert_eq!(
            client.search(SearchParams::new(0, 10)).unwrap_err(),
            Error::Unauthenticated
        );
        assert_eq!(client.delete_post(1).await.unwrap_err(), Error::Unauthenticated);
        assert_eq!(
            client.update_post(Post::new(1, "t", "b", 1)).await.unwrap_err(),
            Error::Unauthenticated
        );
        assert!(client.watch_posts().is_err());
        assert!(client.cache().is_empty());
        assert!(client.delete_state().is_idle());
    }

    #[test]
    fn test_logout_when_logged_out() {
        let client = PostsClient::new(&ClientConfig::default()).unwrap();
        client.logout().unwrap();
    }
}
