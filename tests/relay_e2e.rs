//! End-to-end tests: fake rich client on the endpoint port, raw HTTP peer on
//! the HTTP port.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{eventually, http_exchange, start_relay, test_config, FakeEndpoint, TIMEOUT};

#[tokio::test]
async fn get_request_tunneled_and_answered() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });

    assert_eq!(endpoint.next_line().await, "GET /x */*");
    endpoint.send(b"11:hello world").await;

    let response = client.await.unwrap();
    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world"
    );
    relay.shutdown.trigger();
}

#[tokio::test]
async fn post_body_and_reply_split_across_reads() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(
            http_addr,
            b"POST /form HTTP/1.1\r\nHost: intranet\r\nAccept: text/html\r\nContent-Length: 3\r\n\r\na=b",
        )
        .await
    });

    assert_eq!(endpoint.next_line().await, "POST /form text/html a=b");
    endpoint.send(b"10:<b>").await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    endpoint.send(b"hi</b>").await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    endpoint.send(b"!").await;

    let response = client.await.unwrap();
    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n<b>hi</b>!"
    );
    relay.shutdown.trigger();
}

#[tokio::test]
async fn session_serves_many_requests_in_order() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    for i in 0..3 {
        let http_addr = relay.http_addr;
        let request = format!("GET /page/{} HTTP/1.1\r\nAccept: text/plain\r\n\r\n", i);
        let client = tokio::spawn(async move { http_exchange(http_addr, request.as_bytes()).await });

        assert_eq!(endpoint.next_line().await, format!("GET /page/{} text/plain", i));
        let body = format!("page {}", i);
        endpoint.send(format!("{}:{}", body.len(), body).as_bytes()).await;

        let response = client.await.unwrap();
        let expected = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
        assert_eq!(String::from_utf8(response).unwrap(), expected);
    }
    assert_eq!(relay.sessions.active_count(), 1);
    relay.shutdown.trigger();
}

#[tokio::test]
async fn malformed_request_gets_500_and_session_survives() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let response = http_exchange(relay.http_addr, b"DELETE /x HTTP/1.1\r\nAccept: */*\r\n\r\n").await;
    assert_eq!(response, b"HTTP/1.1 500 OK\n");

    let response = http_exchange(relay.http_addr, b"GET /no-accept HTTP/1.1\r\nHost: h\r\n\r\n").await;
    assert_eq!(response, b"HTTP/1.1 500 OK\n");

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /ok HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(endpoint.next_line().await, "GET /ok */*");
    endpoint.send(b"2:ok").await;
    assert_eq!(
        client.await.unwrap(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"
    );
    relay.shutdown.trigger();
}

#[tokio::test]
async fn sentinel_forwarded_verbatim_and_session_survives() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;
    let sentinel: &[u8] = b"HTTP/1.1 502 Not accessible\r\nContent-Length: 0\r\n\r\n";

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET http://10.0.0.1/ HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(endpoint.next_line().await, "GET http://10.0.0.1/ */*");
    endpoint.send(sentinel).await;
    assert_eq!(client.await.unwrap(), sentinel);

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /after HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(endpoint.next_line().await, "GET /after */*");
    endpoint.send(b"3:yes").await;
    assert_eq!(
        client.await.unwrap(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nyes"
    );
    relay.shutdown.trigger();
}

#[tokio::test]
async fn endpoint_disconnect_yields_503_and_ends_session() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(endpoint.next_line().await, "GET /x */*");
    drop(endpoint);

    assert_eq!(
        client.await.unwrap(),
        b"HTTP/1.1 503 Client disconnected, retry later\n"
    );
    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.active_count() == 0).await);
    assert_eq!(relay.sessions.started_count(), 1);

    // No session is left to pick up HTTP-side connections.
    let mut stream = TcpStream::connect(relay.http_addr).await.unwrap();
    stream
        .write_all(b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf)).await;
    assert!(read.is_err(), "no session should answer");

    relay.shutdown.trigger();
}

#[tokio::test]
async fn endpoint_reset_yields_503_and_ends_session() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(endpoint.next_line().await, "GET /x */*");
    endpoint.reset();

    assert_eq!(
        client.await.unwrap(),
        b"HTTP/1.1 503 Client disconnected, retry later\n"
    );
    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.active_count() == 0).await);
    assert_eq!(relay.sessions.started_count(), 1);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn empty_handshake_starts_no_session() {
    let relay = start_relay(test_config()).await;

    let stream = TcpStream::connect(relay.endpoint_addr).await.unwrap();
    drop(stream);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(relay.sessions.started_count(), 0);

    // The relay keeps accepting endpoints afterwards.
    let _endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;
    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.started_count() == 1).await);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn max_sessions_holds_extra_endpoints_until_a_slot_frees() {
    let mut config = test_config();
    config.listener.max_sessions = 1;
    let relay = start_relay(config).await;

    let mut first = FakeEndpoint::connect(relay.endpoint_addr).await;
    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.started_count() == 1).await);

    let _second = FakeEndpoint::connect(relay.endpoint_addr).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(relay.sessions.started_count(), 1, "second endpoint must wait for a slot");

    // End the first session: it only notices the drop while serving a request.
    let http_addr = relay.http_addr;
    let client = tokio::spawn(async move {
        http_exchange(http_addr, b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n").await
    });
    assert_eq!(first.next_line().await, "GET /x */*");
    drop(first);
    assert_eq!(
        client.await.unwrap(),
        b"HTTP/1.1 503 Client disconnected, retry later\n"
    );

    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.started_count() == 2 && sessions.active_count() == 1).await);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn policy_marker_serves_flex_policy_without_session() {
    let relay = start_relay(test_config()).await;

    let mut stream = TcpStream::connect(relay.endpoint_addr).await.unwrap();
    stream.write_all(b"<policy-file-request/>\0").await.unwrap();
    let mut document = Vec::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut document))
        .await
        .unwrap()
        .unwrap();

    let document = String::from_utf8(document).unwrap();
    assert!(document.contains("<cross-domain-policy>"));
    assert!(document.contains(&format!(
        "domain=\"ria.test\" to-ports=\"{}\"",
        relay.endpoint_addr.port()
    )));
    assert!(document.ends_with('\0'));
    assert_eq!(relay.sessions.started_count(), 0);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn http_client_reads_tunneled_response() {
    let relay = start_relay(test_config()).await;
    let mut endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;

    let url = format!("http://{}/status", relay.http_addr);
    let client = tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .http1_title_case_headers()
            .no_proxy()
            .build()
            .unwrap();
        let res = client
            .get(url)
            .header("Accept", "text/plain")
            .send()
            .await
            .unwrap();
        (res.status(), res.text().await.unwrap())
    });

    assert_eq!(endpoint.next_line().await, "GET /status text/plain");
    endpoint.send(b"7:healthy").await;

    let (status, body) = client.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "healthy");
    relay.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_relay_and_sessions() {
    let relay = start_relay(test_config()).await;
    let _endpoint = FakeEndpoint::connect(relay.endpoint_addr).await;
    let sessions = relay.sessions.clone();
    assert!(eventually(|| sessions.active_count() == 1).await);

    relay.shutdown.trigger();
    tokio::time::timeout(TIMEOUT, relay.task)
        .await
        .expect("relay did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(relay.sessions.active_count(), 0);
}
