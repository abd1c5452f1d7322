//! Wire types for the `/auth` endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to a post by the remote service.
pub type PostId = u64;

/// An opaque bearer token.
///
/// The token is only ever taken from a login response; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// The authenticated user, as returned by `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    // Older deployments answer with `token`, newer ones with `accessToken`.
    #[serde(alias = "accessToken")]
    pub token: Credential,
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// A blog post.
///
/// Fields the service computes on its own (tags, reactions, views...) are kept
/// in `extra` so that an update round-trips them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub user_id: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    pub fn new(id: PostId, title: impl Into<String>, body: impl Into<String>, user_id: u64) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            user_id,
            extra: Map::new(),
        }
    }
}

/// A page of posts, as returned by the list and search endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<Post>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

impl PostList {
    /// A new snapshot with `post` in front.
    #[must_use]
    pub fn prepended(&self, post: Post) -> Self {
        let mut posts = Vec::with_capacity(self.posts.len() + 1);
        posts.push(post);
        posts.extend(self.posts.iter().cloned());
        Self {
            posts,
            total: self.total.saturating_add(1),
            ..self.clone()
        }
    }

    /// A new snapshot without the post whose id is `id`.
    #[must_use]
    pub fn without(&self, id: PostId) -> Self {
        let posts: Vec<Post> = self.posts.iter().filter(|post| post.id != id).cloned().collect();
        let removed = (self.posts.len() - posts.len()) as u64;
        Self {
            posts,
            total: self.total.saturating_sub(removed),
            ..self.clone()
        }
    }

    pub fn ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|post| post.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Pagination for the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchParams {
    pub skip: u64,
    pub limit: u64,
}

impl SearchParams {
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(ids: &[PostId]) -> PostList {
        PostList {
            posts: ids
                .iter()
                .map(|id| Post::new(*id, format!("post {id}"), "", 1))
                .collect(),
            total: ids.len() as u64,
            skip: 0,
            limit: 30,
        }
    }

    #[test]
    fn test_user_accepts_either_token_name() {
        let old: User = serde_json::from_value(json!({
            "id": 1,
            "username": "emilys",
            "token": "abc",
        }))
        .unwrap();
        assert_eq!(old.token, Credential::new("abc"));

        let new: User = serde_json::from_value(json!({
            "id": 1,
            "username": "emilys",
            "firstName": "Emily",
            "accessToken": "xyz",
            "refreshToken": "ignored",
        }))
        .unwrap();
        assert_eq!(new.token, Credential::new("xyz"));
        assert_eq!(new.first_name.as_deref(), Some("Emily"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{credential:?}"), "Credential(****)");
        let request = LoginRequest::new("emilys", "hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn test_post_keeps_server_fields() {
        let value = json!({
            "id": 7,
            "title": "t",
            "body": "b",
            "userId": 3,
            "tags": ["a", "b"],
            "views": 12,
        });
        let post: Post = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(post.user_id, 3);
        assert_eq!(post.extra.get("views"), Some(&json!(12)));
        assert_eq!(serde_json::to_value(&post).unwrap(), value);
    }

    #[test]
    fn test_post_list_tolerates_bare_posts() {
        let list: PostList = serde_json::from_value(json!({ "posts": [] })).unwrap();
        assert!(list.posts.is_empty());
        assert_eq!(list.total, 0);
    }

    #[test]
    fn test_prepended() {
        let original = list(&[1, 2]);
        let updated = original.prepended(Post::new(3, "post 3", "", 1));
        assert_eq!(updated.ids(), vec![3, 1, 2]);
        assert_eq!(updated.total, 3);
        assert_eq!(original.ids(), vec![1, 2]);
    }

    #[test]
    fn test_without() {
        let original = list(&[1, 2, 3]);
        let updated = original.without(2);
        assert_eq!(updated.ids(), vec![1, 3]);
        assert_eq!(updated.total, 2);

        let untouched = original.without(99);
        assert_eq!(untouched.ids(), vec![1, 2, 3]);
        assert_eq!(untouched.total, 3);
    }

    #[test]
    fn test_create_request_wire_shape() {
        let request = CreatePostRequest {
            title: "hello".to_string(),
            user_id: 5,
            body: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "title": "hello", "userId": 5 })
        );
    }
}
