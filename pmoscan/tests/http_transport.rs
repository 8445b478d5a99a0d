//! HttpTransport against a mock data server

use pmoscan::{Error, FetchRequest, FetchResponse, HttpTransport, MediaKind, ReferenceMode, Transport};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scalar_request(time: f64, duration: f64) -> FetchRequest {
    FetchRequest::new(
        "src/temp.csv",
        MediaKind::Scalar,
        ReferenceMode::Absolute,
        time,
        duration,
        1,
    )
}

#[tokio::test]
async fn test_data_response_carries_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/CT/src/temp.csv"))
        .and(query_param("dt", "s"))
        .and(query_param("f", "b"))
        .and(query_param("d", "10"))
        .and(query_param("r", "absolute"))
        .and(query_param("t", "1.5"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("time", "1.5")
                .insert_header("duration", "0.5")
                .insert_header("oldest", "0.25")
                .insert_header("newest", "3")
                .insert_header("lagtime", "0.1")
                .set_body_string("1.5,1\n2,2\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).await.unwrap();
    let response = transport.fetch(&scalar_request(1_500.0, 10_000.0)).await.unwrap();

    match response {
        FetchResponse::Data { meta, body } => {
            assert_eq!(meta.time, Some(1_500.0));
            assert_eq!(meta.duration, Some(500.0));
            assert_eq!(meta.oldest, Some(250.0));
            assert_eq!(meta.newest, Some(3_000.0));
            assert_eq!(meta.lag_time, Some(100.0));
            assert_eq!(body, b"1.5,1\n2,2\n".to_vec());
        }
        other => panic!("expected data, got {:?}", other),
    }
}

#[tokio::test]
async fn test_conditional_request_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/CT/src/temp.csv"))
        .and(header("if-none-match", "src/temp.csv:1500"))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).await.unwrap();
    let request = scalar_request(1_500.001, 0.0).with_dedupe(Some("src/temp.csv:1500".to_string()));
    let response = transport.fetch(&request).await.unwrap();
    assert_eq!(response, FetchResponse::NotModified);
}

#[tokio::test]
async fn test_missing_data_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/CT/src/gone.csv"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).await.unwrap();

    // Nothing mounted for this path: wiremock answers 404
    let response = transport.fetch(&scalar_request(0.0, 1_000.0)).await.unwrap();
    assert_eq!(response, FetchResponse::NoData);

    let gone = FetchRequest::new("src/gone.csv", MediaKind::Scalar, ReferenceMode::Absolute, 0.0, 1_000.0, 1);
    assert_eq!(transport.fetch(&gone).await.unwrap(), FetchResponse::NoData);
}

#[tokio::test]
async fn test_server_error_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).await.unwrap();
    let result = transport.fetch(&scalar_request(0.0, 1_000.0)).await;
    assert!(matches!(result, Err(Error::Status(503))));
}

#[tokio::test]
async fn test_malformed_header_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("newest", "soon"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).await.unwrap();
    let result = transport.fetch(&scalar_request(0.0, 1_000.0)).await;
    assert!(matches!(result, Err(Error::InvalidHeader { .. })));
}

#[tokio::test]
async fn test_newest_probe_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/src/cam.jpg"))
        .and(query_param("dt", "b"))
        .and(query_param("f", "t"))
        .and(query_param("r", "newest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1700000000.25"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::builder()
        .base_url(server.uri())
        .servlet_root("/data")
        .build()
        .await
        .unwrap();
    let probe = FetchRequest::limit_probe("src/cam.jpg", MediaKind::Image, ReferenceMode::Newest, 1);
    let response = transport.fetch(&probe).await.unwrap();

    match response {
        FetchResponse::Data { body, .. } => {
            assert_eq!(
                pmoscan::scheduler::parse_time_body(&body).unwrap(),
                1_700_000_000_250.0
            );
        }
        other => panic!("expected data, got {:?}", other),
    }
}
