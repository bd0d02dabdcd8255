//! Integration tests for the HTTP providers against a canned local server.

use duelhall_protocol::{AnimationCategory, ProviderKind};
use duelhall_roster::{
    AnimationProvider, CombatantProvider, JikanCatalog, ProviderError, Roster, RosterConfig,
    StaticCatalog, WaifuAnimations,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// =========================================================================
// Helpers
// =========================================================================

/// A client that ignores proxy settings from the environment.
fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn jikan(base: impl Into<String>) -> JikanCatalog {
    JikanCatalog::with_client(client(), base)
}

fn waifu(base: impl Into<String>) -> WaifuAnimations {
    WaifuAnimations::with_client(client(), base)
}

/// Serves exactly one HTTP response and reports the request line it saw.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let head = String::from_utf8_lossy(&head).into_owned();
        let request_line = head.lines().next().unwrap_or_default().to_owned();
        let _ = seen_tx.send(request_line);

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (format!("http://{addr}"), seen_rx)
}

const CHARACTERS: &str = r#"{"data":[
    {"mal_id":40,"name":"Monkey D. Luffy","images":{"jpg":{"image_url":"https://cdn/luffy.jpg"}}},
    {"mal_id":62,"name":"Roronoa Zoro","images":{"jpg":{"image_url":"https://cdn/zoro.jpg"}}}
]}"#;

// =========================================================================
// Jikan
// =========================================================================

#[tokio::test]
async fn test_jikan_search_maps_characters() {
    let (base, seen) = serve_once("200 OK", CHARACTERS).await;
    let catalog = jikan(base);

    let found = catalog.search("luffy").await.unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, 40);
    assert_eq!(found[0].name, "Monkey D. Luffy");
    assert_eq!(found[1].image_url, "https://cdn/zoro.jpg");
    for c in &found {
        assert!((50..150).contains(&c.stats.strength));
        assert!((50..150).contains(&c.stats.power));
    }

    let request_line = seen.await.unwrap();
    assert!(request_line.starts_with("GET /characters?"), "{request_line}");
    assert!(request_line.contains("q=luffy"));
    assert!(request_line.contains("limit=5"));
}

#[tokio::test]
async fn test_jikan_error_status() {
    let (base, _seen) = serve_once("503 Service Unavailable", "{}").await;
    let err = jikan(base).search("luffy").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status(503)), "{err}");
}

#[tokio::test]
async fn test_jikan_malformed_body() {
    let (base, _seen) = serve_once("200 OK", r#"{"results": []}"#).await;
    let err = jikan(base).search("luffy").await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)), "{err}");
}

#[tokio::test]
async fn test_jikan_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let err = jikan(format!("http://{addr}"))
        .search("luffy")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Request(_)), "{err}");
}

#[tokio::test]
async fn test_roster_remote_search_through_jikan() {
    let (base, _seen) = serve_once("200 OK", CHARACTERS).await;
    let roster = Roster::new(
        StaticCatalog::heroes(),
        jikan(base),
        RosterConfig {
            limit: 1,
            ..RosterConfig::default()
        },
    );

    let found = roster.search(ProviderKind::Remote, "luffy").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Monkey D. Luffy");
}

#[tokio::test]
async fn test_roster_remote_failure_is_empty() {
    let (base, _seen) = serve_once("500 Internal Server Error", "oops").await;
    let roster = Roster::new(
        StaticCatalog::heroes(),
        jikan(base),
        RosterConfig::default(),
    );

    assert!(roster.search(ProviderKind::Remote, "luffy").await.is_empty());
}

// =========================================================================
// waifu.pics
// =========================================================================

#[tokio::test]
async fn test_waifu_fetch_returns_url() {
    let (base, seen) = serve_once("200 OK", r#"{"url":"https://i.waifu.pics/abc.gif"}"#).await;
    let animations = waifu(base);

    let url = animations.fetch(AnimationCategory::Kick).await.unwrap();

    assert_eq!(url, "https://i.waifu.pics/abc.gif");
    assert_eq!(seen.await.unwrap(), "GET /sfw/kick HTTP/1.1");
}

#[tokio::test]
async fn test_waifu_empty_url_is_malformed() {
    let (base, _seen) = serve_once("200 OK", r#"{"url":""}"#).await;
    let err = waifu(base)
        .fetch(AnimationCategory::Smug)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)), "{err}");
}

#[tokio::test]
async fn test_waifu_missing_url_is_malformed() {
    let (base, _seen) = serve_once("200 OK", r#"{"message":"nope"}"#).await;
    let err = waifu(base)
        .fetch(AnimationCategory::Bonk)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)), "{err}");
}
