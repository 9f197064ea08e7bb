use famcal::feed::fetcher::CALENDAR_ACCEPT;
use famcal::{FeedFetcher, FeedParser, FetchError, HttpFeedFetcher};
use mockito::Server;

const BODY: &str = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:Bake sale\r\nDTSTART:20240510T150000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

#[tokio::test]
async fn test_fetch_sends_calendar_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/family.ics")
        .match_header("accept", CALENDAR_ACCEPT)
        .match_header("user-agent", "famcal-test/1.0")
        .with_status(200)
        .with_header("content-type", "text/calendar")
        .with_body(BODY)
        .create_async()
        .await;

    let fetcher = HttpFeedFetcher::with_user_agent("famcal-test/1.0");
    let body = fetcher.fetch(&format!("{}/family.ics", server.url())).await.unwrap();

    mock.assert_async().await;
    assert_eq!(body, BODY);
    let events = FeedParser::new().parse(&body);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Bake sale");
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/gone.ics")
        .with_status(404)
        .with_body("missing")
        .expect(1)
        .create_async()
        .await;

    let fetcher = HttpFeedFetcher::new();
    let err = fetcher.fetch(&format!("{}/gone.ics", server.url())).await.unwrap_err();

    mock.assert_async().await;
    match err {
        FetchError::Status { status, status_text } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky.ics")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let err = HttpFeedFetcher::new()
        .fetch(&format!("{}/flaky.ics", server.url()))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "Failed to fetch calendar: 503 Service Unavailable");
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // Nothing listens on port 1.
    let err = HttpFeedFetcher::new().fetch("http://127.0.0.1:1/cal.ics").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(err.to_string().starts_with("Failed to fetch calendar:"));
}
