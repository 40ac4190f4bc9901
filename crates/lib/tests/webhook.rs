//! Integration test: start the webhook server on a free port with dummy credentials,
//! check the liveness route, and verify ignored and malformed updates are answered
//! without any outbound call. Does not reach Telegram, OpenAI, or Airtable; the server
//! task is left running when the test ends.

use lib::config::Config;
use lib::gateway;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config.telegram.bot_token = Some("TEST:TOKEN".to_string());
    config.openai.api_key = Some("sk-test".to_string());
    config.airtable.api_key = Some("key-test".to_string());
    config.airtable.base_id = Some("appTEST".to_string());
    config
}

async fn wait_until_live(client: &reqwest::Client, url: &str) {
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.expect("read body");
                assert_eq!(body, "content idea bot alive");
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not return 200 within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn webhook_acknowledges_ignored_updates() {
    let port = free_port();
    let config = test_config(port);
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);
    wait_until_live(&client, &format!("{}/", base)).await;

    let webhook = format!("{}/telegram", base);

    // No message, edited_message, or channel_post: acknowledged, nothing happens.
    let resp = client
        .post(&webhook)
        .json(&serde_json::json!({ "update_id": 1 }))
        .send()
        .await
        .expect("post empty update");
    assert_eq!(resp.status(), 200);

    // A message without text or voice (e.g. a photo) is also ignored.
    let resp = client
        .post(&webhook)
        .json(&serde_json::json!({
            "update_id": 2,
            "message": { "chat": { "id": 10 }, "photo": [] }
        }))
        .send()
        .await
        .expect("post unsupported message");
    assert_eq!(resp.status(), 200);

    // A body that is not JSON at all is rejected.
    let resp = client
        .post(&webhook)
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .expect("post malformed body");
    assert_eq!(resp.status(), 400);
}
