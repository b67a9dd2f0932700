//! The built-in app server serves the bundle and answers health probes.

use std::time::Duration;

use quantix_e2e::server::AppServer;

#[tokio::test]
async fn serves_bundle_with_health_route() {
    let bundle = tempfile::tempdir().unwrap();
    std::fs::write(
        bundle.path().join("index.html"),
        "<html><body id=\"app-container\">Quantix</body></html>",
    )
    .unwrap();

    let server = AppServer::serve(bundle.path(), None).await.unwrap();
    let base = server.base_url().to_string();
    assert!(base.starts_with("http://127.0.0.1:"));

    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert!(health.status().is_success());
    assert_eq!(health.text().await.unwrap(), "ok");

    let index = client
        .get(format!("{base}/index.html"))
        .send()
        .await
        .unwrap();
    assert!(index.status().is_success());
    let body = index.text().await.unwrap();
    assert!(body.contains("app-container"));
}

#[tokio::test]
async fn attach_finds_the_builtin_server() {
    let bundle = tempfile::tempdir().unwrap();
    std::fs::write(bundle.path().join("index.html"), "<html></html>").unwrap();

    let server = AppServer::serve(bundle.path(), None).await.unwrap();
    let origin = server.base_url().to_string();

    let attached = AppServer::attach(&origin, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(attached.base_url(), origin);
}

#[tokio::test]
async fn stop_closes_the_listener() {
    let bundle = tempfile::tempdir().unwrap();
    std::fs::write(bundle.path().join("index.html"), "<html></html>").unwrap();

    let mut server = AppServer::serve(bundle.path(), None).await.unwrap();
    let base = server.base_url().to_string();
    server.stop();

    // Give the task a moment to wind down.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    assert!(client.get(format!("{base}/health")).send().await.is_err());
}
