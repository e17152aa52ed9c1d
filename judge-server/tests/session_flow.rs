use std::sync::Arc;

use axum::http::StatusCode;
use judge_core::SessionStore;
use judge_server::handlers::session::SessionResponse;
use judge_server::routes::paths;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

#[path = "support/mod.rs"]
mod support;
use support::{FixedEvaluator, PUBLIC_ORIGIN, build_test_app};

fn frame() -> Option<Vec<u8>> {
    Some(vec![0xFF, 0xD8, 0xFF, 0xE0])
}

#[tokio::test]
async fn health_reports_ok() -> anyhow::Result<()> {
    let app = build_test_app(vec![], None).await?;

    let response = app.server.get(paths::HEALTH).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
    Ok(())
}

#[tokio::test]
async fn session_lifecycle_initialize_waiting_success() -> anyhow::Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let amazon = FixedEvaluator::gated("amazon", 81, gate.clone());
    let meta = FixedEvaluator::new("meta", 47);
    let app = build_test_app(vec![amazon.clone(), meta.clone()], frame()).await?;

    let body = json!({"session_id": "booth-1", "theme": "Y"});

    let first: SessionResponse = app.server.post(paths::SESSION).json(&body).await.json();
    assert!(!first.status);
    assert_eq!(first.message, "initialize");
    assert_eq!(first.data, None);
    assert_eq!(first.image_url, format!("{PUBLIC_ORIGIN}/booth-1.png"));

    let second: SessionResponse = app.server.post(paths::SESSION).json(&body).await.json();
    assert!(!second.status);
    assert_eq!(second.message, "waiting");

    gate.add_permits(1);
    app.settle().await;

    let done: SessionResponse = app.server.post(paths::SESSION).json(&body).await.json();
    assert!(done.status);
    assert_eq!(done.message, "success");
    let data = done.data.expect("scores present");
    assert_eq!(data.len(), 2);

    assert_eq!(amazon.calls(), 1);
    assert_eq!(meta.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn repeated_posts_after_ready_do_not_rescore() -> anyhow::Result<()> {
    let evaluator = FixedEvaluator::new("anthropic", 90);
    let app = build_test_app(vec![evaluator.clone()], frame()).await?;
    let body = json!({"session_id": "s-1", "theme": "C"});

    app.server.post(paths::SESSION).json(&body).await;
    app.settle().await;

    for _ in 0..3 {
        let response: SessionResponse = app.server.post(paths::SESSION).json(&body).await.json();
        assert_eq!(response.message, "success");
    }
    app.settle().await;
    assert_eq!(evaluator.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn result_without_any_session() -> anyhow::Result<()> {
    let app = build_test_app(vec![FixedEvaluator::new("meta", 10)], frame()).await?;

    let response: SessionResponse = app.server.get(paths::RESULT).await.json();
    assert_eq!(
        response,
        SessionResponse {
            status: false,
            message: "no session found".into(),
            data: None,
            image_url: String::new(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn result_follows_latest_session() -> anyhow::Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let evaluator = FixedEvaluator::gated("stability", 55, gate.clone());
    let app = build_test_app(vec![evaluator.clone()], frame()).await?;

    app.server
        .post(paths::SESSION)
        .json(&json!({"session_id": "first", "theme": "A"}))
        .await;
    app.server
        .post(paths::SESSION)
        .json(&json!({"session_id": "second", "theme": "B"}))
        .await;

    let pending: SessionResponse = app.server.get(paths::RESULT).await.json();
    assert!(!pending.status);
    assert_eq!(pending.message, "no result found");
    assert_eq!(pending.image_url, format!("{PUBLIC_ORIGIN}/second.png"));

    gate.add_permits(2);
    app.settle().await;

    let ready: SessionResponse = app.server.get(paths::RESULT).await.json();
    assert!(ready.status);
    assert_eq!(ready.message, "success");
    assert_eq!(ready.image_url, format!("{PUBLIC_ORIGIN}/second.png"));

    // Polling the latest result never schedules more work.
    app.server.get(paths::RESULT).await;
    app.settle().await;
    assert_eq!(evaluator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn session_without_image_reports_empty_success() -> anyhow::Result<()> {
    let evaluator = FixedEvaluator::new("amazon", 70);
    let app = build_test_app(vec![evaluator.clone()], None).await?;
    let body = json!({"session_id": "dark", "theme": "C"});

    app.server.post(paths::SESSION).json(&body).await;
    app.settle().await;

    let done: SessionResponse = app.server.post(paths::SESSION).json(&body).await.json();
    assert!(done.status);
    assert_eq!(done.data.map(|d| d.len()), Some(0));
    assert_eq!(evaluator.calls(), 0);

    let latest: SessionResponse = app.server.get(paths::RESULT).await.json();
    assert!(!latest.status);
    assert_eq!(latest.message, "no result found");
    Ok(())
}

#[tokio::test]
async fn lookup_by_id_is_read_only() -> anyhow::Result<()> {
    let evaluator = FixedEvaluator::new("meta", 33);
    let app = build_test_app(vec![evaluator.clone()], frame()).await?;

    let unknown: SessionResponse = app.server.get("/session/ghost").await.json();
    assert!(!unknown.status);
    assert_eq!(unknown.message, "not found");
    assert!(app.store.is_empty().await);

    app.server
        .post(paths::SESSION)
        .json(&json!({"session_id": "known", "theme": "K"}))
        .await;
    app.settle().await;

    let known: SessionResponse = app.server.get("/session/known").await.json();
    assert!(known.status);
    assert_eq!(evaluator.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_input_is_rejected_without_side_effects() -> anyhow::Result<()> {
    let app = build_test_app(vec![FixedEvaluator::new("meta", 1)], frame()).await?;

    for body in [
        json!({"session_id": "ok", "theme": "AB"}),
        json!({"session_id": "ok", "theme": ""}),
        json!({"session_id": "", "theme": "C"}),
        json!({"session_id": "bad\nid", "theme": "C"}),
    ] {
        let response = app.server.post(paths::SESSION).json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"]["status"], 400);
    }

    assert!(app.store.is_empty().await);
    assert_eq!(app.store.latest_session().await?, None);
    Ok(())
}

#[tokio::test]
async fn image_url_escapes_session_id() -> anyhow::Result<()> {
    let app = build_test_app(vec![], frame()).await?;

    let response: SessionResponse = app
        .server
        .post(paths::SESSION)
        .json(&json!({"session_id": "booth 2?x", "theme": "Z"}))
        .await
        .json();
    assert_eq!(response.image_url, format!("{PUBLIC_ORIGIN}/booth%202%3Fx.png"));
    Ok(())
}

#[tokio::test]
async fn image_url_resolves_to_the_published_asset() -> anyhow::Result<()> {
    let app = build_test_app(vec![], frame()).await?;

    let response: SessionResponse = app
        .server
        .post(paths::SESSION)
        .json(&json!({"session_id": "booth 2?x", "theme": "Z"}))
        .await
        .json();

    // Publish the way the filesystem provider names the asset.
    let asset_dir = &app.state.config.assets.dir;
    std::fs::create_dir_all(asset_dir)?;
    std::fs::write(asset_dir.join("booth 2?x.png"), b"png bytes")?;

    let path = response
        .image_url
        .strip_prefix(PUBLIC_ORIGIN)
        .expect("image url under the public origin");
    let asset = app.server.get(&format!("{}{path}", paths::ASSETS)).await;
    asset.assert_status_ok();
    assert_eq!(&asset.as_bytes()[..], b"png bytes");
    Ok(())
}

#[tokio::test]
async fn ids_that_cannot_name_a_file_get_no_image_url() -> anyhow::Result<()> {
    let app = build_test_app(vec![], frame()).await?;

    let response: SessionResponse = app
        .server
        .post(paths::SESSION)
        .json(&json!({"session_id": "../escape", "theme": "Z"}))
        .await
        .json();
    assert_eq!(response.message, "initialize");
    assert!(response.image_url.is_empty());
    Ok(())
}

#[tokio::test]
async fn mock_invocation_echoes_model_and_theme() -> anyhow::Result<()> {
    let app = build_test_app(vec![], None).await?;

    let response = app
        .server
        .post(paths::INVOCATIONS)
        .json(&json!({"model": "meta.llama4", "theme": "C", "image": "AAAA"}))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["reason"], "meta.llama4 model invoked with theme C");
    let score = body["score"].as_i64().unwrap();
    assert!((0..=100).contains(&score));
    Ok(())
}
