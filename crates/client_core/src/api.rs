//! HTTP client for the posts backend.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CommentId, PostId},
    error::ErrorBody,
    protocol::{
        AccessToken, LikeToggle, NewCommentRequest, NewPostRequest, PostListing, PostPage,
        RefreshRequest, RegisterRequest, TokenPair, TokenRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ApiError;

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid api base url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("api base url must start with http:// or https://"));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn obtain_tokens(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request = self.http.post(self.endpoint("token/")).json(&TokenRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        decode(send(request).await?).await
    }

    pub async fn renew_access(&self, refresh_token: &str) -> Result<AccessToken, ApiError> {
        let request = self
            .http
            .post(self.endpoint("token/refresh/"))
            .json(&RefreshRequest {
                refresh: refresh_token.to_string(),
            });
        decode(send(request).await?).await
    }

    pub async fn register(&self, payload: &RegisterRequest) -> Result<(), ApiError> {
        let request = self.http.post(self.endpoint("register/")).json(payload);
        expect_success(send(request).await?).await
    }

    pub async fn list_posts(&self, page: u32, bearer: Option<&str>) -> Result<PostPage, ApiError> {
        let request = self
            .http
            .get(self.endpoint("posts/"))
            .query(&[("page", page)]);
        let listing: PostListing = decode(send(authorize(request, bearer)).await?).await?;
        Ok(listing.into_page())
    }

    pub async fn create_post(&self, bearer: &str, text: &str) -> Result<(), ApiError> {
        let request = self.http.post(self.endpoint("posts/")).json(&NewPostRequest {
            text: text.to_string(),
        });
        expect_success(send(authorize(request, Some(bearer))).await?).await
    }

    pub async fn add_comment(&self, bearer: &str, post_id: PostId, text: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.endpoint(&format!("posts/{post_id}/comments/")))
            .json(&NewCommentRequest {
                text: text.to_string(),
            });
        expect_success(send(authorize(request, Some(bearer))).await?).await
    }

    pub async fn toggle_like(&self, bearer: &str, post_id: PostId) -> Result<LikeToggle, ApiError> {
        let request = self
            .http
            .post(self.endpoint(&format!("posts/{post_id}/like/")));
        decode(send(authorize(request, Some(bearer))).await?).await
    }

    pub async fn delete_post(&self, bearer: &str, post_id: PostId) -> Result<(), ApiError> {
        let request = self.http.delete(self.endpoint(&format!("posts/{post_id}/")));
        expect_success(send(authorize(request, Some(bearer))).await?).await
    }

    pub async fn delete_comment(&self, bearer: &str, comment_id: CommentId) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("comments/{comment_id}/delete/")));
        expect_success(send(authorize(request, Some(bearer))).await?).await
    }
}

fn authorize(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    request
        .send()
        .await
        .map_err(|err| ApiError::Network(err.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::Network(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let url = response.url().path().to_string();
    let bytes = response.bytes().await.unwrap_or_default();
    let message = ErrorBody::from_bytes(&bytes).and_then(|body| body.flatten());
    debug!(status = status.as_u16(), path = %url, "api: request rejected");

    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized { message }
    } else {
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
