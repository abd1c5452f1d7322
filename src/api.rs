//! Typed calls for each remote endpoint.
//!
//! | Operation    | Method | Path                        | Auth |
//! |--------------|--------|-----------------------------|------|
//! | login        | POST   | `/auth/login`               | no   |
//! | list posts   | GET    | `/auth/posts`               | yes  |
//! | search posts | GET    | `/auth/posts?skip=&limit=`  | yes  |
//! | get post     | GET    | `/auth/posts/{id}`          | yes  |
//! | create post  | POST   | `/auth/posts/add`           | yes  |
//! | update post  | PUT    | `/auth/posts/{id}`          | yes  |
//! | delete post  | DELETE | `/auth/posts/{id}`          | yes  |

use reqwest::Method;

use crate::error::Result;
use crate::http::{HttpClient, NO_BODY};
use crate::model::{
    CreatePostRequest, Credential, LoginRequest, Post, PostId, PostList, SearchParams, User,
};

#[derive(Debug, Clone)]
pub struct PostsApi {
    http: HttpClient,
}

impl PostsApi {
    pub const fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub const fn http(&self) -> &HttpClient {
        &self.http
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User> {
        self.http
            .send(Method::POST, "/auth/login", Some(request), None)
            .await
    }

    pub async fn list_posts(&self, credential: &Credential) -> Result<PostList> {
        self.http
            .send(Method::GET, "/auth/posts", NO_BODY, Some(credential))
            .await
    }

    pub async fn search_posts(
        &self,
        params: SearchParams,
        credential: &Credential,
    ) -> Result<PostList> {
        let path = format!("/auth/posts?skip={}&limit={}", params.skip, params.limit);
        self.http
            .send(Method::GET, &path, NO_BODY, Some(credential))
            .await
    }

    pub async fn get_post(&self, id: PostId, credential: &Credential) -> Result<Post> {
        self.http
            .send(Method::GET, &post_path(id), NO_BODY, Some(credential))
            .await
    }

    pub async fn create_post(
        &self,
        request: &CreatePostRequest,
        credential: &Credential,
    ) -> Result<Post> {
        self.http
            .send(Method::POST, "/auth/posts/add", Some(request), Some(credential))
            .await
    }

    pub async fn update_post(&self, post: &Post, credential: &Credential) -> Result<Post> {
        self.http
            .send(Method::PUT, &post_path(post.id), Some(post), Some(credential))
            .await
    }

    /// Deletes a post. Whatever the service echoes back is discarded.
    pub async fn delete_post(&self, id: PostId, credential: &Credential) -> Result<()> {
        self.http
            .request(Method::DELETE, &post_path(id), NO_BODY, Some(credential))
            .await
            .map(drop)
    }
}

fn post_path(id: PostId) -> String {
    format!("/auth/posts/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> PostsApi {
        PostsApi::new(HttpClient::new(&ClientConfig::new(server.uri())).unwrap())
    }

    #[tokio::test]
    async fn test_search_sends_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/posts"))
            .and(query_param("skip", "10"))
            .and(query_param("limit", "5"))
            .and(header("Authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [{ "id": 11, "title": "eleven", "body": "", "userId": 2 }],
                "total": 150,
                "skip": 10,
                "limit": 5,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = api_for(&server)
            .search_posts(SearchParams::new(10, 5), &Credential::new("t"))
            .await
            .unwrap();
        assert_eq!(page.ids(), vec![11]);
        assert_eq!(page.total, 150);
    }

    #[tokio::test]
    async fn test_create_posts_to_add() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/posts/add"))
            .and(body_json(json!({ "title": "hello", "userId": 5 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 252, "title": "hello", "userId": 5,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreatePostRequest {
            title: "hello".to_string(),
            user_id: 5,
            body: None,
        };
        let post = api_for(&server)
            .create_post(&request, &Credential::new("t"))
            .await
            .unwrap();
        assert_eq!(post.id, 252);
        assert_eq!(post.body, "");
    }

    #[tokio::test]
    async fn test_update_puts_full_record() {
        let server = MockServer::start().await;
        let post = Post::new(4, "new title", "body", 1);
        Mock::given(method("PUT"))
            .and(path("/auth/posts/4"))
            .and(body_json(json!({ "id": 4, "title": "new title", "body": "body", "userId": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4, "title": "new title", "body": "body", "userId": 1, "views": 3,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let updated = api_for(&server)
            .update_post(&post, &Credential::new("t"))
            .await
            .unwrap();
        assert_eq!(updated.extra.get("views"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_delete_ignores_echo() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/auth/posts/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4, "isDeleted": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server)
            .delete_post(4, &Credential::new("t"))
            .await
            .unwrap();
    }
}
