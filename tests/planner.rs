//! Planner client tests against an in-process mock chat-completions server.

use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};

use webpilot::AgentError;
use webpilot::brain::Brain;
use webpilot::config::Config;
use webpilot::types::{Action, MAX_PLAN_STEPS};

fn test_config(base_url: String) -> Config {
    Config {
        api_key: "test-key".into(),
        model: "test-model".into(),
        base_url,
        referer: Some("https://example.test".into()),
        title: Some("webpilot tests".into()),
        browser_ws: "ws://127.0.0.1:9/devtools/browser/unused".into(),
        port: 0,
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn completion(content: &str) -> Json<Value> {
    Json(json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    }))
}

#[tokio::test]
async fn plan_parses_model_output() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            completion(
                r#"{"steps":[{"action":"GOTO","target":"https://x.test"},{"action":"done","value":"opened the page"}]}"#,
            )
        }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    let plan = brain.plan("open the page", "https://x.test").await.unwrap();
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[0].action, Action::Goto);
    assert_eq!(plan.steps[0].target, "https://x.test");
    assert_eq!(plan.steps[1].value, json!("opened the page"));
}

#[tokio::test]
async fn plan_salvages_prose_wrapped_output() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            completion(r#"Sure! {"steps":[{"action":"goto","target":"https://x.test"}]} thanks"#)
        }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    let plan = brain.plan("open the page", "").await.unwrap();
    assert_eq!(plan.steps[0].target, "https://x.test");
}

#[tokio::test]
async fn plan_truncates_to_twelve_steps() {
    let steps: Vec<Value> = (0..20)
        .map(|i| json!({ "action": "extract", "target": format!("#s{i}") }))
        .collect();
    let body = json!({ "steps": steps }).to_string();
    let app = Router::new().route(
        "/chat/completions",
        post(move || async move { completion(&body) }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    let plan = brain.plan("extract everything", "").await.unwrap();
    assert_eq!(plan.steps.len(), MAX_PLAN_STEPS);
}

#[tokio::test]
async fn plan_rejects_non_json_output() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { completion("I cannot help with that.") }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    let err = brain.plan("open the page", "").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidModelOutput));
}

#[tokio::test]
async fn plan_surfaces_upstream_errors() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "bad credentials" } })),
            )
        }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    let err = brain.plan("open the page", "").await.unwrap_err();
    match err {
        AgentError::Upstream { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad credentials");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn plan_sends_credentials_and_attribution_headers() {
    let seen: Arc<Mutex<Vec<(String, String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let app = Router::new().route(
        "/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                let pick = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                sink.lock().unwrap().push((
                    pick("authorization"),
                    pick("http-referer"),
                    pick("x-title"),
                ));
                assert_eq!(body["model"], json!("test-model"));
                assert_eq!(body["temperature"], json!(0.2));
                assert_eq!(body["response_format"]["type"], json!("json_object"));
                assert_eq!(body["messages"][0]["role"], json!("system"));
                assert_eq!(body["messages"][1]["role"], json!("user"));
                completion(r#"{"steps":[{"action":"done"}]}"#)
            }
        }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    brain.plan("open the page", "https://x.test").await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, referer, title) = &seen[0];
    assert_eq!(auth, "Bearer test-key");
    assert_eq!(referer, "https://example.test");
    assert_eq!(title, "webpilot tests");
}

#[tokio::test]
async fn plan_embeds_goal_and_start_url() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let app = Router::new().route(
        "/chat/completions",
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                let user = body["messages"][1]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                sink.lock().unwrap().push(user);
                completion(r#"{"steps":[{"action":"done"}]}"#)
            }
        }),
    );
    let brain = Brain::new(Arc::new(test_config(serve(app).await)));

    brain
        .plan("find the pricing page", "https://x.test")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen[0].contains("find the pricing page"));
    assert!(seen[0].contains("startUrl: https://x.test"));
}
