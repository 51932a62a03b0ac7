use super::*;
use crate::mock_backend::{unreachable_base_url, MockBackend, BAD_CREDENTIALS, BAD_TOKEN};
use axum::http::StatusCode as MockStatus;
use serde_json::json;
use shared::protocol::LikeStatus;

fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5)).expect("client")
}

#[test]
fn rejects_non_http_base_url() {
    assert!(ApiClient::new("ftp://example.com/api", Duration::from_secs(1)).is_err());
    assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
}

#[test]
fn trailing_slash_is_normalized() {
    let client = client_for("http://127.0.0.1:8000/api/");
    assert_eq!(client.endpoint("/posts/"), "http://127.0.0.1:8000/api/posts/");
}

#[tokio::test]
async fn obtains_tokens_for_known_user() {
    let backend = MockBackend::spawn().await;
    backend.add_user("alice", "wonderland").await;
    let client = client_for(&backend.base_url);

    let tokens = client
        .obtain_tokens("alice", "wonderland")
        .await
        .expect("tokens");
    assert!(tokens.access.starts_with("access-"));
    assert!(tokens.refresh.starts_with("refresh-"));

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/token/");
    assert_eq!(requests[0].bearer, None);
}

#[tokio::test]
async fn bad_credentials_map_to_unauthorized_with_detail() {
    let backend = MockBackend::spawn().await;
    let err = client_for(&backend.base_url)
        .obtain_tokens("alice", "wrong")
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        ApiError::Unauthorized {
            message: Some(BAD_CREDENTIALS.to_string())
        }
    );
}

#[tokio::test]
async fn list_posts_sends_page_and_optional_bearer() {
    let backend = MockBackend::spawn().await;
    backend.add_user("alice", "pw").await;
    for n in 0..3 {
        backend.add_post("alice", &format!("post number {n}")).await;
    }
    let client = client_for(&backend.base_url);

    let anonymous = client.list_posts(2, None).await.expect("page 2");
    assert_eq!(anonymous.results.len(), 1);
    assert!(anonymous.previous.is_some());
    assert!(anonymous.next.is_none());

    let tokens = client.obtain_tokens("alice", "pw").await.expect("tokens");
    let first = client
        .list_posts(1, Some(&tokens.access))
        .await
        .expect("page 1");
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.count, Some(3));

    let requests = backend.requests().await;
    assert_eq!(requests[0].query.as_deref(), Some("page=2"));
    assert_eq!(requests[0].bearer, None);
    assert_eq!(requests[2].bearer.as_deref(), Some(tokens.access.as_str()));
}

#[tokio::test]
async fn invalid_bearer_is_unauthorized() {
    let backend = MockBackend::spawn().await;
    let err = client_for(&backend.base_url)
        .list_posts(1, Some("stale-token"))
        .await
        .expect_err("must fail");
    assert!(err.is_unauthorized());
    assert_eq!(err.server_message(), Some(BAD_TOKEN));
}

#[tokio::test]
async fn field_errors_are_flattened_into_status_error() {
    let backend = MockBackend::spawn().await;
    backend
        .fail_register(
            MockStatus::BAD_REQUEST,
            json!({"email": ["Enter a valid email address."], "password": ["Too short."]}),
        )
        .await;

    let err = client_for(&backend.base_url)
        .register(&RegisterRequest {
            username: "bob".into(),
            email: "bad".into(),
            password: "x".into(),
        })
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        ApiError::Status {
            status: 400,
            message: Some("Enter a valid email address., Too short.".into()),
        }
    );
}

#[tokio::test]
async fn non_json_error_body_has_no_message() {
    let backend = MockBackend::spawn().await;
    backend
        .fail_posts(MockStatus::BAD_GATEWAY, json!("upstream unavailable"))
        .await;
    let err = client_for(&backend.base_url)
        .list_posts(1, None)
        .await
        .expect_err("must fail");
    // A JSON string body still flattens to its text.
    assert_eq!(err.server_message(), Some("upstream unavailable"));

    backend.fail_posts(MockStatus::INTERNAL_SERVER_ERROR, json!({})).await;
    let err = client_for(&backend.base_url)
        .list_posts(1, None)
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        ApiError::Status {
            status: 500,
            message: None
        }
    );
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let base_url = unreachable_base_url().await;
    let err = client_for(&base_url)
        .list_posts(1, None)
        .await
        .expect_err("must fail");
    assert!(err.is_network(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn post_actions_round_trip_against_backend() {
    let backend = MockBackend::spawn().await;
    backend.add_user("alice", "pw").await;
    let client = client_for(&backend.base_url);
    let tokens = client.obtain_tokens("alice", "pw").await.expect("tokens");

    client
        .create_post(&tokens.access, "a brand new post")
        .await
        .expect("create");
    let page = client.list_posts(1, None).await.expect("list");
    let post_id = page.results[0].id;

    let liked = client.toggle_like(&tokens.access, post_id).await.expect("like");
    assert_eq!(liked.status, LikeStatus::Liked);
    let unliked = client.toggle_like(&tokens.access, post_id).await.expect("unlike");
    assert_eq!(unliked.status, LikeStatus::Unliked);

    client
        .add_comment(&tokens.access, post_id, "nice one")
        .await
        .expect("comment");
    let page = client.list_posts(1, None).await.expect("list");
    let comment_id = page.results[0].comments[0].id;

    client
        .delete_comment(&tokens.access, comment_id)
        .await
        .expect("delete comment");
    client
        .delete_post(&tokens.access, post_id)
        .await
        .expect("delete post");
    assert_eq!(backend.post_count().await, 0);
}

#[tokio::test]
async fn renews_access_token_from_refresh_token() {
    let backend = MockBackend::spawn().await;
    backend.add_user("alice", "pw").await;
    let client = client_for(&backend.base_url);
    let tokens = client.obtain_tokens("alice", "pw").await.expect("tokens");

    let renewed = client.renew_access(&tokens.refresh).await.expect("renew");
    assert_ne!(renewed.access, tokens.access);
    client
        .list_posts(1, Some(&renewed.access))
        .await
        .expect("renewed token accepted");

    let err = client
        .renew_access("refresh-bogus")
        .await
        .expect_err("must fail");
    assert!(err.is_unauthorized());
}
