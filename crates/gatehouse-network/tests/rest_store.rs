//! Integration tests for the REST sink, card fetch and attendance source.
//!
//! Each test starts a plain TCP server speaking just enough HTTP/1.1 to
//! answer the client: one request per connection, canned responses routed
//! by method and table, every request recorded for inspection.
//!
//! Run with: cargo test --package gatehouse-network --test rest_store

use chrono::NaiveDate;
use gatehouse_attendance::{
    AttendanceSource, AttendanceStore, ManualOverride, PersonId, ReconciliationEngine, TimeRange,
};
use gatehouse_core::{AccessEvent, CardUid, Decision};
use gatehouse_network::{
    DeliveryOutcome, EventSink, NetworkError, RemoteConfig, RestAttendanceSource, RestClient,
    RestEventSink, fetch_card_uids,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn query(&self) -> String {
        percent_decode(self.target.split_once('?').map(|(_, q)| q).unwrap_or(""))
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct Route {
    method: &'static str,
    table: &'static str,
    status: u16,
    body: String,
}

fn route(method: &'static str, table: &'static str, status: u16, body: &str) -> Route {
    Route {
        method,
        table,
        status,
        body: body.to_string(),
    }
}

type Log = Arc<Mutex<Vec<Recorded>>>;

/// Start a mock REST server; returns its base URL and the request log.
async fn serve(routes: Vec<Route>) -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let recorded = log.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let Some(request) = read_request(&mut stream).await else {
                continue;
            };
            let table = request
                .target
                .trim_start_matches("/rest/v1/")
                .split('?')
                .next()
                .unwrap_or("")
                .to_string();
            let reply = routes
                .iter()
                .find(|r| r.method == request.method && r.table == table)
                .cloned()
                .unwrap_or_else(|| route("", "", 404, r#"{"message":"no route"}"#));
            recorded.lock().unwrap().push(request);

            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.status,
                reply.body.len(),
                reply.body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), log)
}

async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(Recorded {
        method,
        target,
        headers,
        body,
    })
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap()
}

fn client(base_url: &str) -> RestClient {
    RestClient::new(
        RemoteConfig::new(base_url, "test-key").timeout(Duration::from_millis(1000)),
    )
    .unwrap()
}

fn event(uid: &str, decision: Decision) -> AccessEvent {
    AccessEvent::new(CardUid::parse(uid).unwrap(), decision)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Event sink
// ============================================================================

#[tokio::test]
async fn test_granted_event_posts_to_access_logs() {
    let (base, log) = serve(vec![route("POST", "access_logs", 201, "")]).await;
    let sink = RestEventSink::new(client(&base), "lock-1");

    let outcome = sink.deliver(&event("0xA1B2C3", Decision::Granted)).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered);

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/rest/v1/access_logs");
    assert_eq!(request.header("apikey"), Some("test-key"));
    assert_eq!(request.header("authorization"), Some("Bearer test-key"));
    assert_eq!(request.header("prefer"), Some("return=minimal"));
    assert_eq!(
        request.json(),
        serde_json::json!({"card_uid": "0xa1b2c3", "lock": "lock-1", "status": true})
    );
}

#[tokio::test]
async fn test_denied_event_posts_to_unidentified_cards() {
    let (base, log) = serve(vec![route("POST", "unidentified_cards", 201, "")]).await;
    let sink = RestEventSink::new(client(&base), "north-gate");

    let outcome = sink.deliver(&event("0xa1b2c3", Decision::Denied)).await;
    assert!(outcome.is_delivered());

    let request = log.lock().unwrap()[0].clone();
    assert_eq!(request.target, "/rest/v1/unidentified_cards");
    assert_eq!(
        request.json(),
        serde_json::json!({"card_uid": "0xa1b2c3", "lock": "north-gate"})
    );
}

#[tokio::test]
async fn test_server_error_is_failed_delivery() {
    let (base, _log) = serve(vec![route("POST", "access_logs", 503, "busy")]).await;
    let sink = RestEventSink::new(client(&base), "lock-1");

    match sink.deliver(&event("0x01", Decision::Granted)).await {
        DeliveryOutcome::Failed(reason) => assert!(reason.contains("503"), "{reason}"),
        DeliveryOutcome::Delivered => panic!("503 must not count as delivered"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_failed_delivery() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = RestEventSink::new(client(&format!("http://{addr}")), "lock-1");
    let outcome = sink.deliver(&event("0x01", Decision::Granted)).await;
    assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // accept and hold the connection without answering
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let config =
        RemoteConfig::new(format!("http://{addr}"), "k").timeout(Duration::from_millis(200));
    let sink = RestEventSink::new(RestClient::new(config).unwrap(), "lock-1");

    let started = std::time::Instant::now();
    let outcome = sink.deliver(&event("0x01", Decision::Granted)).await;
    assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Card list
// ============================================================================

#[tokio::test]
async fn test_fetch_card_uids() {
    let body = r#"[{"card_uid":"0xA1B2C3"},{"card_uid":null},{"card_uid":"bogus"},{"card_uid":"0x0102"}]"#;
    let (base, log) = serve(vec![route("GET", "persons", 200, body)]).await;

    let uids = fetch_card_uids(&client(&base)).await.unwrap();
    let rendered: Vec<_> = uids.iter().map(CardUid::as_str).collect();
    assert_eq!(rendered, vec!["0xa1b2c3", "0x0102"]);

    let query = log.lock().unwrap()[0].query();
    assert!(query.contains("select=card_uid"), "{query}");
    assert!(query.contains("card_uid=not.is.null"), "{query}");
}

#[tokio::test]
async fn test_fetch_card_uids_surfaces_status() {
    let (base, _log) = serve(vec![route("GET", "persons", 401, "bad key")]).await;

    let err = fetch_card_uids(&client(&base)).await.unwrap_err();
    assert!(matches!(err, NetworkError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_fetch_card_uids_rejects_non_json() {
    let (base, _log) = serve(vec![route("GET", "persons", 200, "<html>")]).await;

    let err = fetch_card_uids(&client(&base)).await.unwrap_err();
    assert!(matches!(err, NetworkError::InvalidResponse(_)));
}

// ============================================================================
// Attendance source
// ============================================================================

#[tokio::test]
async fn test_roster_joins_register_and_persons() {
    let (base, log) = serve(vec![
        route("GET", "choir_register", 200, r#"[{"person_id":2},{"person_id":1},{"person_id":9}]"#),
        route(
            "GET",
            "persons",
            200,
            r#"[
                {"id":1,"name":"Lerato","surname":"Zulu","grade":"11","card_uid":"0xA1B2C3"},
                {"id":2,"name":"Ayanda","surname":"Mokoena","grade":10,"card_uid":null}
            ]"#,
        ),
    ])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    let roster = source.roster(2025).await.unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].surname, "Mokoena");
    assert_eq!(roster[0].grade.as_deref(), Some("10"));
    assert!(roster[0].card_uid.is_none());
    assert_eq!(roster[1].person_id, PersonId(1));
    assert_eq!(roster[1].card_uid.as_ref().unwrap().as_str(), "0xa1b2c3");

    let requests = log.lock().unwrap().clone();
    assert!(requests[0].query().contains("year=eq.2025"));
    assert!(requests[1].query().contains("id=in.(2,1,9)"));
}

#[tokio::test]
async fn test_empty_register_skips_person_lookup() {
    let (base, log) = serve(vec![route("GET", "choir_register", 200, "[]")]).await;
    let source = RestAttendanceSource::new(client(&base));

    assert!(source.roster(2025).await.unwrap().is_empty());
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_events_merge_granted_and_denied() {
    let (base, log) = serve(vec![
        route(
            "GET",
            "access_logs",
            200,
            r#"[{"card_uid":"0x01","lock":"lock-1","status":true,"created_at":"2025-01-10T14:00:00+00:00"}]"#,
        ),
        route(
            "GET",
            "unidentified_cards",
            200,
            r#"[{"card_uid":"0x02","lock":"lock-1","created_at":"2025-01-10T13:00:00+00:00"}]"#,
        ),
    ])
    .await;
    let source = RestAttendanceSource::new(client(&base));
    let range = TimeRange::local_day(date(2025, 1, 10), source.offset());

    let events = source.events_between(range).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].card_uid.as_str(), "0x02");
    assert!(!events[0].granted);
    assert_eq!(events[1].card_uid.as_str(), "0x01");
    assert!(events[1].granted);

    let query = log.lock().unwrap()[0].query();
    assert!(query.contains("created_at=gte.2025-01-09T22:00:00Z"), "{query}");
    assert!(query.contains("created_at=lt.2025-01-10T22:00:00Z"), "{query}");
}

#[tokio::test]
async fn test_event_failure_is_source_error() {
    let (base, _log) = serve(vec![route("GET", "access_logs", 500, "down")]).await;
    let source = RestAttendanceSource::new(client(&base));
    let range = TimeRange::local_day(date(2025, 1, 10), source.offset());

    assert!(source.events_between(range).await.is_err());
}

#[tokio::test]
async fn test_overrides_keep_newest_row_per_person() {
    let (base, log) = serve(vec![route(
        "GET",
        "manual_choir_attendance",
        200,
        r#"[
            {"id":1,"person_id":4,"attended":false,"excuse":true,"created_at":"2025-01-10T08:00:00+00:00"},
            {"id":2,"person_id":4,"attended":true,"excuse":false,"created_at":"2025-01-10T09:00:00+00:00"},
            {"id":3,"person_id":5,"attended":false,"excuse":true,"created_at":"2025-01-10T09:30:00+00:00"}
        ]"#,
    )])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    let overrides = source.overrides_on(date(2025, 1, 10), None).await.unwrap();
    assert_eq!(
        overrides,
        vec![
            ManualOverride {
                person_id: PersonId(4),
                date: date(2025, 1, 10),
                attended: true,
                excuse: false,
            },
            ManualOverride {
                person_id: PersonId(5),
                date: date(2025, 1, 10),
                attended: false,
                excuse: true,
            },
        ]
    );
    assert!(!log.lock().unwrap()[0].query().contains("person_id"));
}

#[tokio::test]
async fn test_upsert_patches_existing_row() {
    let (base, log) = serve(vec![
        route(
            "GET",
            "manual_choir_attendance",
            200,
            r#"[{"id":17,"person_id":4,"attended":false,"excuse":true,"created_at":"2025-01-10T08:00:00+00:00"}]"#,
        ),
        route("PATCH", "manual_choir_attendance", 204, ""),
    ])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    source
        .upsert_override(ManualOverride {
            person_id: PersonId(4),
            date: date(2025, 1, 10),
            attended: true,
            excuse: false,
        })
        .await
        .unwrap();

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].query().contains("person_id=eq.4"));
    assert_eq!(requests[1].method, "PATCH");
    assert!(requests[1].query().contains("id=eq.17"));
    let body = requests[1].json();
    assert_eq!(body["attended"], true);
    assert_eq!(body["excuse"], false);
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn test_upsert_inserts_when_missing() {
    let (base, log) = serve(vec![
        route("GET", "manual_choir_attendance", 200, "[]"),
        route("POST", "manual_choir_attendance", 201, ""),
    ])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    source
        .upsert_override(ManualOverride {
            person_id: PersonId(4),
            date: date(2024, 6, 1),
            attended: false,
            excuse: true,
        })
        .await
        .unwrap();

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[1].method, "POST");
    assert_eq!(
        requests[1].json(),
        serde_json::json!({
            "person_id": 4,
            "attended": false,
            "excuse": true,
            "created_at": "2024-06-01T10:00:00Z"
        })
    );
}

#[tokio::test]
async fn test_create_practice_date_once() {
    let (base, log) = serve(vec![
        route("GET", "choir_practice_dates", 200, "[]"),
        route("POST", "choir_practice_dates", 201, ""),
    ])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    assert!(source.create_practice_date(date(2025, 2, 3)).await.unwrap());
    let requests = log.lock().unwrap().clone();
    assert!(requests[0].query().contains("date=eq.2025-02-03"));
    assert_eq!(requests[1].json(), serde_json::json!({"date": "2025-02-03"}));
}

#[tokio::test]
async fn test_create_existing_practice_date_is_noop() {
    let (base, log) = serve(vec![route(
        "GET",
        "choir_practice_dates",
        200,
        r#"[{"date":"2025-02-03"}]"#,
    )])
    .await;
    let source = RestAttendanceSource::new(client(&base));

    assert!(!source.create_practice_date(date(2025, 2, 3)).await.unwrap());
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_yearly_report_over_rest() {
    let (base, _log) = serve(vec![
        route("GET", "choir_practice_dates", 200, r#"[{"date":"2025-01-10"}]"#),
        route("GET", "choir_register", 200, r#"[{"person_id":1},{"person_id":2}]"#),
        route(
            "GET",
            "persons",
            200,
            r#"[
                {"id":1,"name":"Lerato","surname":"Zulu","grade":"11","card_uid":"0xa1b2c3"},
                {"id":2,"name":"Ayanda","surname":"Mokoena","grade":"10","card_uid":"0x0a0b"}
            ]"#,
        ),
        route(
            "GET",
            "access_logs",
            200,
            r#"[{"card_uid":"0xA1B2C3","lock":"lock-1","status":true,"created_at":"2025-01-10T14:00:00+00:00"}]"#,
        ),
        route("GET", "unidentified_cards", 200, "[]"),
        route(
            "GET",
            "manual_choir_attendance",
            200,
            r#"[{"id":1,"person_id":2,"attended":false,"excuse":true,"created_at":"2025-01-10T08:00:00+00:00"}]"#,
        ),
    ])
    .await;
    let engine = ReconciliationEngine::new(RestAttendanceSource::new(client(&base)));

    let report = engine.yearly_report(2025).await;
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.people.len(), 2);

    let ayanda = &report.people[0];
    assert_eq!(ayanda.person.name, "Ayanda");
    assert_eq!(ayanda.excused, 1);
    assert_eq!(ayanda.percentage.to_string(), "N/A");

    let lerato = &report.people[1];
    assert_eq!(lerato.present, 1);
    assert_eq!(lerato.percentage.to_string(), "100.0%");
}
