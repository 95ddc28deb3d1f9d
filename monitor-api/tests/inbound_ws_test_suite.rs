use axum_test::TestServer;
use clap::Parser as _;
use futures::{SinkExt as _, StreamExt as _};
use seele_monitor_api::config::MonitorConfig;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

fn test_config(args: &[&str]) -> MonitorConfig {
    let argv = ["monitor-api", "--enable-rpc"]
        .into_iter()
        .chain(args.iter().copied());
    let config = MonitorConfig::try_parse_from(argv).expect("parses");
    config.validate().expect("valid");
    config
}

fn test_server(args: &[&str]) -> TestServer {
    let router =
        seele_monitor_api::router(&test_config(args), "testhost_127.0.0.1:9999".to_owned());
    TestServer::builder()
        .http_transport()
        .build(router)
        .expect("can build test-server")
}

#[tokio::test]
async fn ping_gets_a_pong() {
    let server = test_server(&["--enable-websocket"]);
    let mut websocket = server.get_websocket("/api").await.into_websocket().await;
    websocket.send_text(r#"{"emit":["node-ping",{}]}"#).await;
    let reply: Value = websocket.receive_json().await;
    assert_eq!(reply["emit"][0], "node-pong");
    let id = reply["emit"][1]["id"].as_str().expect("id is a string");
    assert!(id.contains("testhost"), "id should carry the hostname: {id}");
    assert!(reply["emit"][1]["clientTime"].is_string());
}

#[tokio::test]
async fn binary_frames_are_ignored() -> eyre::Result<()> {
    // a real server plus a raw tungstenite client, so a binary frame can be
    // pushed over the wire
    let router = seele_monitor_api::router(
        &test_config(&["--enable-websocket"]),
        "testhost_127.0.0.1:9999".to_owned(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api")).await?;
    socket
        .send(Message::Binary(vec![1u8, 2, 3].into()))
        .await?;
    // the loop must still be alive, serving pings, and the binary frame must
    // not have produced a reply of its own
    socket
        .send(Message::text(r#"{"emit":["node-ping",{}]}"#))
        .await?;
    let reply = loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(_)) => continue,
            other => panic!("connection ended before a reply: {other:?}"),
        }
    };
    let reply: Value = serde_json::from_str(reply.as_str())?;
    assert_eq!(reply["emit"][0], "node-pong");
    Ok(())
}

#[tokio::test]
async fn non_ping_text_is_echoed() {
    let server = test_server(&["--enable-websocket"]);
    let mut websocket = server.get_websocket("/api").await.into_websocket().await;
    let msg = r#"{"emit":["history",{"max":42}]}"#;
    websocket.send_text(msg).await;
    websocket.assert_receive_text(msg).await;
}

#[tokio::test]
async fn malformed_text_is_echoed() {
    let server = test_server(&["--enable-websocket"]);
    let mut websocket = server.get_websocket("/api").await.into_websocket().await;
    let msg = "not even json";
    websocket.send_text(msg).await;
    websocket.assert_receive_text(msg).await;
}

#[tokio::test]
async fn ping_with_wrong_arity_is_echoed() {
    let server = test_server(&["--enable-websocket"]);
    let mut websocket = server.get_websocket("/api").await.into_websocket().await;
    let msg = r#"{"emit":["node-ping"]}"#;
    websocket.send_text(msg).await;
    websocket.assert_receive_text(msg).await;
}

#[tokio::test]
async fn health_endpoint_answers() {
    let server = test_server(&[]);
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("healthy");
}

#[tokio::test]
async fn ws_route_absent_when_disabled() {
    let server = test_server(&[]);
    server.get("/api").await.assert_status_not_found();
}
