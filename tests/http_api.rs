use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

use records_server::app::AppState;
use records_server::config::Config;
use records_server::http::build_router;
use records_server::store::Database;

fn router_with(vars: &[(&str, &str)]) -> Router {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = Config::from_lookup(|key| {
        vars.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap();
    build_router(AppState::new(config, Database::open_in_memory().unwrap()))
}

fn router() -> Router {
    router_with(&[("DATABASE_PATH", ":memory:")])
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_backends() {
    let (status, body) = send(&router(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "memory");
    assert_eq!(body["logbook_enabled"], false);
}

#[tokio::test]
async fn item_lifecycle() {
    let app = router();
    let pen = json!({
        "code": "QC-001",
        "name": "Pen",
        "quantity": "10",
        "price": "5000",
        "category": "Alat Kantor"
    });

    let (status, body) = send(&app, Method::POST, "/items", Some(pen.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["code"], "QC-001");

    let (status, body) = send(&app, Method::POST, "/items", Some(pen)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let (status, body) = send(&app, Method::GET, "/items?q=qc&scope=Kode", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::GET, "/items/summary", None).await;
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["total_quantity"], 10);

    let (status, _) = send(&app, Method::DELETE, "/items/QC-001", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, "/items/QC-001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_update_takes_code_from_path() {
    let app = router();
    send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "code": "QC-001", "name": "Pen", "quantity": "10" })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/items/QC-001",
        Some(json!({ "name": "Pen biru", "quantity": "12", "price": "5000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "QC-001");
    assert_eq!(body["name"], "Pen biru");
    assert_eq!(body["quantity"], 12);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/items/NOPE",
        Some(json!({ "name": "Pen" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_forms_return_reason() {
    let app = router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/items",
        Some(json!({ "code": "", "name": "Pen" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Kode dan Nama harus diisi");

    let (status, body) = send(
        &app,
        Method::POST,
        "/users",
        Some(json!({ "name": "Budi", "email": "budi@mail.id" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format");
}

#[tokio::test]
async fn users_import_and_export_csv() {
    let app = router();
    let csv = "Name,Email,Age,Phone,Address,Gender,Education\n\
               Budi,budi@mail.com,25,+62 812 3456 7890,Jl. A,Male,Diploma\n\
               Ani,ani@mail.com,abc,+62 812 3456 7891,Jl. B,Female,Diploma\n";

    let request = Request::builder()
        .method(Method::POST)
        .uri("/users/import")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["imported"], 1);

    let response = app
        .clone()
        .oneshot(Request::get("/users/export").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("Name,Email,Age,Phone,Address,Gender,Education\n"));
    assert!(text.contains("budi@mail.com"));
    assert!(!text.contains("ani@mail.com"));
}

#[tokio::test]
async fn validate_single_field() {
    let app = router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/validate",
        Some(json!({ "field": "age", "value": "101" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["error"], "Age must be a number between 10 and 100");

    let (_, body) = send(
        &app,
        Method::POST,
        "/validate",
        Some(json!({ "field": "phone", "value": "+62 812 3456 7890" })),
    )
    .await;
    assert_eq!(body["valid"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/validate",
        Some(json!({ "field": "shoe_size", "value": "42" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logbook_needs_configuration() {
    let (status, body) = send(&router(), Method::GET, "/logbook", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn storage_failures_hide_backend_detail() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/logbook_kkn");
            then.status(500).body("relation logbook_kkn: permission denied for role anon");
        })
        .await;

    let base_url = server.base_url();
    let app = router_with(&[
        ("DATABASE_PATH", ":memory:"),
        ("SUPABASE_URL", base_url.as_str()),
        ("SUPABASE_KEY", "anon"),
    ]);

    let (status, body) = send(&app, Method::GET, "/logbook", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Storage is temporarily unavailable");
    assert!(!body.to_string().contains("permission denied"));
}

#[tokio::test]
async fn logbook_stats_through_supabase() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/logbook_kkn");
            then.status(200).json_body(json!([
                { "id": 2, "judul": "Posyandu", "jkem": 4, "tanggal": "2025-07-20",
                  "status": "Berlangsung", "catatan": null },
                { "id": 1, "judul": "Kerja bakti", "jkem": 3, "tanggal": "2025-07-14",
                  "status": "Selesai", "catatan": "RT 02" }
            ]));
        })
        .await;

    let base_url = server.base_url();
    let app = router_with(&[
        ("DATABASE_PATH", ":memory:"),
        ("SUPABASE_URL", base_url.as_str()),
        ("SUPABASE_KEY", "anon"),
    ]);

    let (status, body) = send(&app, Method::GET, "/logbook/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["ongoing"], 1);
    assert_eq!(body["total_hours"], 7);

    let (_, body) = send(&app, Method::GET, "/logbook?q=posy", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["judul"], "Posyandu");

    let (status, body) = send(
        &app,
        Method::POST,
        "/logbook",
        Some(json!({ "title": "", "hours": "3", "date": "2025-07-14", "status": "Selesai" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Judul kegiatan tidak boleh kosong!");
}
