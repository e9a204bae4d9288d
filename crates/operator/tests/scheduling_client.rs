//! Integration tests of the HTTP scheduling client against an
//! in-process server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use api_types::CarbonSavings;
use api_types::ScheduleOption;
use api_types::ScheduleRequest;
use api_types::ScheduleResponse;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use operator::scheduling_client::HttpSchedulingClient;
use operator::scheduling_client::SchedulingClient;
use operator::scheduling_client::SchedulingClientError;
use poem::handler;
use poem::http::StatusCode;
use poem::listener::Acceptor;
use poem::listener::Listener;
use poem::listener::TcpListener;
use poem::post;
use poem::web::Data;
use poem::web::Json;
use poem::EndpointExt;
use poem::Route;
use poem::Server;

type RecordedRequests = Arc<Mutex<Vec<ScheduleRequest>>>;

fn canned_response() -> ScheduleResponse {
    let at = |secs: i64, co2: f64| ScheduleOption {
        time: Utc.timestamp_opt(secs, 0).unwrap(),
        zone: "gcp:us-west2".to_string(),
        co2_intensity: co2,
    };
    ScheduleResponse {
        ideal: at(3600, 40.0),
        options: vec![at(3600, 40.0), at(7200, 60.0)],
        worst_case: at(0, 90.0),
        naive_case: at(0, 90.0),
        median_case: at(7200, 60.0),
        carbon_savings: CarbonSavings {
            vs_worst_case: 55.6,
            vs_naive_case: 55.6,
            vs_median_case: 33.3,
        },
    }
}

#[handler]
async fn record_and_respond(
    recorded: Data<&RecordedRequests>,
    Json(request): Json<ScheduleRequest>,
) -> Json<ScheduleResponse> {
    recorded.lock().unwrap().push(request);
    Json(canned_response())
}

#[handler]
async fn always_fail() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

#[handler]
async fn not_json() -> &'static str {
    "this is not a schedule response"
}

async fn spawn_server(app: impl poem::Endpoint + 'static) -> SocketAddr {
    let acceptor = TcpListener::bind("127.0.0.1:0")
        .into_acceptor()
        .await
        .unwrap();
    let addr = *acceptor
        .local_addr()
        .first()
        .and_then(|a| a.as_socket_addr())
        .unwrap();
    tokio::spawn(async move {
        let _ = Server::new_with_acceptor(acceptor).run(app).await;
    });
    addr
}

#[tokio::test]
async fn posts_canonical_request_and_decodes_response() {
    let recorded: RecordedRequests = Arc::new(Mutex::new(Vec::new()));
    let app = Route::new()
        .at("/v0/schedule/", post(record_and_respond))
        .data(recorded.clone());
    let addr = spawn_server(app).await;

    let client = HttpSchedulingClient::new(format!("http://{addr}")).unwrap();
    let submission = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    let response = client
        .get_optimal_schedule(
            submission,
            Duration::hours(2),
            Duration::minutes(90),
            "gcp:us-west2",
        )
        .await
        .unwrap();

    assert_eq!(response.ideal.co2_intensity, 40.0);
    assert_eq!(response.options.len(), 2);
    assert_eq!(response.carbon_savings.vs_median_case, 33.3);

    let requests = recorded.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.duration, "PT1H30M", "client emits ISO-8601");
    assert_eq!(request.zones, vec!["gcp:us-west2"]);
    assert_eq!(request.windows.len(), 1);
    assert_eq!(request.windows[0].start, submission);
    assert_eq!(request.windows[0].end, submission + Duration::hours(2));
}

#[tokio::test]
async fn non_200_status_is_a_typed_error() {
    let app = Route::new().at("/v0/schedule/", post(always_fail));
    let addr = spawn_server(app).await;

    let client = HttpSchedulingClient::new(format!("http://{addr}")).unwrap();
    let report = client
        .get_optimal_schedule(
            Utc::now(),
            Duration::hours(1),
            Duration::hours(1),
            "gcp:us-west2",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        report.current_context(),
        SchedulingClientError::Status { status: 500 }
    ));
}

#[tokio::test]
async fn malformed_body_is_a_typed_error() {
    let app = Route::new().at("/v0/schedule/", post(not_json));
    let addr = spawn_server(app).await;

    let client = HttpSchedulingClient::new(format!("http://{addr}")).unwrap();
    let report = client
        .get_optimal_schedule(
            Utc::now(),
            Duration::hours(1),
            Duration::hours(1),
            "gcp:us-west2",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        report.current_context(),
        SchedulingClientError::MalformedBody { .. }
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Nothing listens on this port (bound then dropped).
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpSchedulingClient::new(format!("http://{addr}")).unwrap();
    let report = client
        .get_optimal_schedule(
            Utc::now(),
            Duration::hours(1),
            Duration::hours(1),
            "gcp:us-west2",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        report.current_context(),
        SchedulingClientError::Network { .. }
    ));
}
