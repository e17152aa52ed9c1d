//! `HttpEvaluator` and token acquisition against an in-process backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use judge_config::AuthConfig;
use judge_core::{
    AccessToken, CapturedImage, EvaluationRequest, Evaluator, EvaluatorEndpoint, EvaluatorError,
    EvaluatorId, HttpEvaluator, InvocationRequest, Theme,
};
use judge_server::infra::credentials::{CredentialError, acquire_token};
use serde_json::json;

#[derive(Clone, Default)]
struct Recorded {
    authorization: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<InvocationRequest<'static>>>>,
}

async fn spawn_backend(recorded: Recorded) -> SocketAddr {
    let ok = {
        let recorded = recorded.clone();
        move |headers: HeaderMap, Json(body): Json<InvocationRequest<'static>>| {
            let recorded = recorded.clone();
            async move {
                *recorded.authorization.lock().unwrap() = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let reason = format!("{} saw {}", body.model, body.theme);
                *recorded.body.lock().unwrap() = Some(body);
                Json(json!({"reason": reason, "score": 73}))
            }
        }
    };

    let app = Router::new()
        .route("/ok", post(ok))
        .route(
            "/fail",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model exploded") }),
        )
        .route("/garbage", post(|| async { "definitely not json" }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"reason": "late", "score": 1}))
            }),
        )
        .route(
            "/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                if form.get("client_secret").map(String::as_str) == Some("s3cret")
                    && form.get("grant_type").map(String::as_str) == Some("client_credentials")
                {
                    (StatusCode::OK, Json(json!({"access_token": "issued-token"})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})))
                }
            }),
        )
        .route(
            "/token-empty",
            post(|| async { Json(json!({"token_type": "bearer"})) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn evaluator(addr: SocketAddr, path: &str, token: AccessToken) -> HttpEvaluator {
    HttpEvaluator::new(
        EvaluatorEndpoint {
            id: EvaluatorId::new("amazon"),
            model: "amazon.nova-pro-v1:0".into(),
            url: format!("http://{addr}{path}"),
            timeout: Some(Duration::from_millis(300)),
        },
        reqwest::Client::new(),
        Arc::new(token),
    )
}

fn request() -> EvaluationRequest {
    EvaluationRequest::new(
        Theme::parse("C").unwrap(),
        &CapturedImage::new(vec![1, 2, 3]),
    )
}

#[tokio::test]
async fn successful_call_sends_model_theme_image_and_bearer() {
    let recorded = Recorded::default();
    let addr = spawn_backend(recorded.clone()).await;

    let score = evaluator(addr, "/ok", AccessToken::new("t0k3n"))
        .evaluate(&request())
        .await
        .unwrap();

    assert_eq!(score.score, 73);
    assert_eq!(score.reason, "amazon.nova-pro-v1:0 saw C");
    assert_eq!(
        recorded.authorization.lock().unwrap().as_deref(),
        Some("Bearer t0k3n")
    );
    let body = recorded.body.lock().unwrap().clone().unwrap();
    assert_eq!(body.model, "amazon.nova-pro-v1:0");
    assert_eq!(body.theme, "C");
    assert_eq!(body.image, "AQID");
}

#[tokio::test]
async fn anonymous_token_sends_no_authorization() {
    let recorded = Recorded::default();
    let addr = spawn_backend(recorded.clone()).await;

    evaluator(addr, "/ok", AccessToken::anonymous())
        .evaluate(&request())
        .await
        .unwrap();
    assert_eq!(*recorded.authorization.lock().unwrap(), None);
}

#[tokio::test]
async fn non_success_status_is_a_status_failure() {
    let addr = spawn_backend(Recorded::default()).await;

    let err = evaluator(addr, "/fail", AccessToken::anonymous())
        .evaluate(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "status");
    assert!(matches!(
        err,
        EvaluatorError::Status { status: 500, ref body, .. } if body == "model exploded"
    ));
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let addr = spawn_backend(Recorded::default()).await;

    let err = evaluator(addr, "/garbage", AccessToken::anonymous())
        .evaluate(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn slow_backend_hits_the_timeout() {
    let addr = spawn_backend(Recorded::default()).await;

    let err = evaluator(addr, "/slow", AccessToken::anonymous())
        .evaluate(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = evaluator(addr, "/ok", AccessToken::anonymous())
        .evaluate(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transport");
}

fn auth(addr: SocketAddr, path: &str, secret: &str) -> AuthConfig {
    AuthConfig {
        token_url: Some(format!("http://{addr}{path}").parse().unwrap()),
        client_id: Some("judge".into()),
        client_secret: Some(secret.into()),
        grant_type: "client_credentials".into(),
        scope: Some("agents/invoke".into()),
    }
}

#[tokio::test]
async fn client_credentials_exchange_yields_token() {
    let addr = spawn_backend(Recorded::default()).await;

    let token = acquire_token(&reqwest::Client::new(), &auth(addr, "/token", "s3cret"))
        .await
        .unwrap();
    assert_eq!(token.expose(), "issued-token");
}

#[tokio::test]
async fn rejected_credentials_fail_startup() {
    let addr = spawn_backend(Recorded::default()).await;

    let err = acquire_token(&reqwest::Client::new(), &auth(addr, "/token", "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::Status { status: 401, .. }));

    let err = acquire_token(&reqwest::Client::new(), &auth(addr, "/token-empty", "s3cret"))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::MissingToken));
}

#[tokio::test]
async fn missing_token_url_means_anonymous() {
    let auth = AuthConfig {
        token_url: None,
        client_id: None,
        client_secret: None,
        grant_type: "client_credentials".into(),
        scope: None,
    };
    let token = acquire_token(&reqwest::Client::new(), &auth).await.unwrap();
    assert!(token.is_anonymous());
}
