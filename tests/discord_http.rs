// tests/discord_http.rs
//
// DiscordClient against an in-process axum server that mimics the two REST
// endpoints we use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use incident_notifier::notify::{
    Channel, ChannelResolver, DiscordClient, NotificationPayload, NotifyError,
};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Fake {
    posts: Arc<Mutex<Vec<(String, Value)>>>,
    auth: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    // Status codes for the next POSTs, then 200.
    script: Arc<Mutex<Vec<u16>>>,
}

async fn get_channel(Path(id): Path<String>) -> Response {
    if id == "42" {
        Json(json!({ "id": "42", "type": 0 })).into_response()
    } else {
        let body = json!({ "message": "Unknown Channel", "code": 10003 });
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}

async fn post_message(
    State(fake): State<Fake>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(v) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        fake.auth.lock().unwrap().push(v.to_string());
    }
    let next = {
        let mut script = fake.script.lock().unwrap();
        if script.is_empty() {
            None
        } else {
            Some(script.remove(0))
        }
    };
    match next {
        Some(429) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 0.05,
                "global": false
            })),
        )
            .into_response(),
        Some(code) => StatusCode::from_u16(code).unwrap().into_response(),
        None => {
            fake.posts.lock().unwrap().push((id, body));
            Json(json!({ "id": "1" })).into_response()
        }
    }
}

async fn serve(fake: Fake) -> String {
    let app = Router::new()
        .route("/channels/{id}", get(get_channel))
        .route("/channels/{id}/messages", post(post_message))
        .with_state(fake);
    listen(app).await
}

async fn listen(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn payload() -> NotificationPayload {
    NotificationPayload {
        title: "🚨 **Test**".into(),
        description: "📍 **Ort:** Berlin\n".into(),
        color: 0xFF0000,
        footer: "1 Messerangriffe insgesamt!".into(),
        image_url: Some("https://api.mapbox.com/x.png".into()),
        thumbnail_url: Some("https://i.imgur.com/P7H1PqY.png".into()),
    }
}

fn client(base: String) -> DiscordClient {
    DiscordClient::new("tok".into()).with_api_base(base)
}

#[tokio::test]
async fn resolve_known_and_unknown_channel() {
    let base = serve(Fake::default()).await;
    let c = client(base);

    let handle = c.resolve(42).await.expect("known channel");
    assert_eq!(handle.id(), 42);

    let err = c.resolve(7).await.err().expect("unknown channel");
    assert!(matches!(err, NotifyError::ChannelNotFound(7)), "{err}");
}

#[tokio::test]
async fn send_posts_one_embed_with_bot_auth() {
    let fake = Fake::default();
    let base = serve(fake.clone()).await;
    let channel = client(base).resolve(42).await.unwrap();

    channel.send(&payload()).await.expect("send ok");

    let posts = fake.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    let (id, body) = &posts[0];
    assert_eq!(id, "42");
    let embed = &body["embeds"][0];
    assert_eq!(embed["title"], "🚨 **Test**");
    assert_eq!(embed["color"], 0xFF0000);
    assert_eq!(embed["footer"]["text"], "1 Messerangriffe insgesamt!");
    assert_eq!(embed["image"]["url"], "https://api.mapbox.com/x.png");
    assert_eq!(embed["thumbnail"]["url"], "https://i.imgur.com/P7H1PqY.png");
    assert_eq!(fake.auth.lock().unwrap()[0], "Bot tok");
}

#[tokio::test]
async fn rate_limit_is_waited_out() {
    let fake = Fake::default();
    *fake.script.lock().unwrap() = vec![429];
    let base = serve(fake.clone()).await;
    let channel = client(base).resolve(42).await.unwrap();

    channel.send(&payload()).await.expect("second attempt succeeds");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fake.posts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let fake = Fake::default();
    *fake.script.lock().unwrap() = vec![400];
    let base = serve(fake.clone()).await;
    let channel = client(base).resolve(42).await.unwrap();

    let err = channel.send(&payload()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Status { status: 400, .. }), "{err}");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_retried_then_given_up() {
    let fake = Fake::default();
    *fake.script.lock().unwrap() = vec![502, 502, 502];
    let base = serve(fake.clone()).await;
    let channel = client(base).with_retries(2).resolve(42).await.unwrap();

    let err = channel.send(&payload()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Status { status: 502, .. }), "{err}");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn timed_out_post_is_not_resent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/channels/{id}", get(get_channel))
        .route(
            "/channels/{id}/messages",
            post(|State(calls): State<Arc<AtomicUsize>>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "id": "1" }))
            }),
        )
        .with_state(calls.clone());
    let base = listen(app).await;
    let channel = client(base).with_timeout(1).resolve(42).await.unwrap();

    let err = channel.send(&payload()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Http(_)), "{err}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
