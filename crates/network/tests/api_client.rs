// crates/network/tests/api_client.rs
//! ApiClient against an in-process mock backend

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use reparto_core::{Coordinates, LocationPing, OrderStatus, SessionStore, UserRole};
use reparto_network::{
    ApiClient, AuthApi, ClientConfig, Geocoder, GeocodingApi, HttpClient, LocationApi,
    NetworkError, OrderApi, ProductApi, RouteApi, UserApi,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Clone, Default)]
struct Backend {
    statuses: Arc<Mutex<Vec<(i64, String)>>>,
    pings: Arc<Mutex<Vec<Value>>>,
    geocode_hits: Arc<AtomicUsize>,
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "tokenless" {
        return Json(json!({
            "token": "",
            "usuario": {"id": 7, "nombre": "Rosa", "email": body["email"], "rol": "Repartidor"}
        }))
        .into_response();
    }
    if body["password"] == "secret" {
        Json(json!({
            "token": "jwt-token",
            "usuario": {"id": 7, "nombre": "Rosa", "email": body["email"], "rol": "Repartidor"}
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Credenciales inválidas"})),
        )
            .into_response()
    }
}

async fn products() -> Json<Value> {
    Json(json!([
        {"id": 1, "nombre": "Agua", "precio": 0.95, "stock": 10, "categoria": "Bebidas", "activo": true},
        {"id": 2, "nombre": "Pan", "precio": 1.2, "stock": 0, "categoria": "Panadería", "activo": true}
    ]))
}

async fn product(Path(id): Path<i64>) -> Response {
    match id {
        1 => Json(json!({
            "id": 1, "nombre": "Agua", "precio": 0.95, "stock": 10, "categoria": "Bebidas"
        }))
        .into_response(),
        2 => (StatusCode::OK, "").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn orders(headers: HeaderMap) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer jwt-token")
        .unwrap_or(false);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([{
        "id": 4,
        "clienteId": 2,
        "estado": "EnReparto",
        "fechaCreacion": "2024-05-01T10:30:00",
        "direccionEntrega": "Calle Luna 3",
        "ciudad": "Sevilla",
        "codigoPostal": "41001"
    }]))
    .into_response()
}

async fn order_status(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> StatusCode {
    let status = body["estado"].as_str().unwrap_or_default().to_string();
    backend.statuses.lock().unwrap().push((id, status));
    StatusCode::NO_CONTENT
}

async fn slow_routes() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!([]))
}

async fn create_location(State(backend): State<Backend>, Json(body): Json<Value>) -> StatusCode {
    backend.pings.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn couriers() -> Json<Value> {
    Json(json!([{"id": 5, "nombre": "Ana", "email": "ana@x.es"}]))
}

async fn search(
    State(backend): State<Backend>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.geocode_hits.fetch_add(1, Ordering::SeqCst);
    let query = params.get("q").cloned().unwrap_or_default();
    if query.contains("nowhere") {
        Json(json!([]))
    } else {
        Json(json!([{"lat": "37.3886", "lon": "-5.9823", "display_name": query}]))
    }
}

async fn spawn_backend() -> (String, Backend) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/Usuarios/login", post(login))
        .route("/api/Productos", get(products))
        .route("/api/Productos/{id}", get(product))
        .route("/api/Pedidos", get(orders))
        .route("/api/Pedidos/{id}/estado", patch(order_status))
        .route("/api/Rutas", get(slow_routes))
        .route("/api/UbicacionesRepartidor", post(create_location))
        .route("/api/Repartidores", get(couriers))
        .route("/search", get(search))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", address), backend)
}

fn client(root: &str, session: SessionStore) -> ApiClient {
    let config = ClientConfig::new(format!("{}/api", root)).with_timeouts(
        Duration::from_secs(1),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );
    ApiClient::new(HttpClient::new(config, session).unwrap())
}

#[tokio::test]
async fn test_login_and_bearer_auth() {
    let (root, _) = spawn_backend().await;
    let store = SessionStore::new();
    let api = client(&root, store.clone());

    let unauthorized = api.list_orders().await.unwrap_err();
    assert_eq!(unauthorized.status(), Some(401));

    let session = api.login("rosa@x.es", "secret").await.unwrap();
    assert_eq!(session.role, UserRole::Courier);
    store.set(session);

    let orders = api.list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::InDelivery);
}

#[tokio::test]
async fn test_login_without_token_is_rejected() {
    let (root, _) = spawn_backend().await;
    let store = SessionStore::new();
    let api = client(&root, store.clone());

    let err = api.login("rosa@x.es", "tokenless").await.unwrap_err();
    assert!(matches!(err, NetworkError::EmptyBody(_)), "{:?}", err);
    assert!(store.current().is_none());
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_rejected_login_carries_server_message() {
    let (root, _) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    match api.login("rosa@x.es", "wrong").await {
        Err(NetworkError::Http { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Credenciales inválidas");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_product_endpoints() {
    let (root, _) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    let products = api.list_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[1].stock, 0);

    assert_eq!(api.get_product(1).await.unwrap().name, "Agua");
    assert!(matches!(
        api.get_product(2).await,
        Err(NetworkError::EmptyBody(_))
    ));
    assert_eq!(api.get_product(99).await.unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn test_status_patch_uses_wire_spelling() {
    let (root, backend) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    api.set_order_status(4, OrderStatus::InDelivery).await.unwrap();

    let statuses = backend.statuses.lock().unwrap().clone();
    assert_eq!(statuses, vec![(4, "EnReparto".to_string())]);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let (root, _) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    let err = api.list_routes().await.unwrap_err();
    assert!(matches!(err, NetworkError::Timeout { .. }), "{:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_location_submission_without_body() {
    let (root, backend) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    let mut ping = LocationPing::new(5, Coordinates::new(37.38, -5.98));
    ping.id = Some(12);
    api.create_location(&ping).await.unwrap();

    let pings = backend.pings.lock().unwrap().clone();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0]["repartidorId"], 5);
    assert!(pings[0].get("id").is_none());
}

#[tokio::test]
async fn test_couriers_get_courier_role() {
    let (root, _) = spawn_backend().await;
    let api = client(&root, SessionStore::new());

    let couriers = api.list_couriers().await.unwrap();
    assert_eq!(couriers[0].role, UserRole::Courier);
}

#[tokio::test]
async fn test_stalled_body_is_a_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        let head = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: application/json\r\n",
            "Content-Length: 64\r\n\r\n[",
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let api = client(&format!("http://{}", address), SessionStore::new());
    let err = api.list_products().await.unwrap_err();
    assert!(matches!(err, NetworkError::Timeout { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let api = client("http://127.0.0.1:9", SessionStore::new());
    let err = api.list_products().await.unwrap_err();
    assert!(matches!(err, NetworkError::NoConnectivity(_)), "{:?}", err);
}

#[tokio::test]
async fn test_geocoder_caches_hits_only() {
    let (root, backend) = spawn_backend().await;
    let geocoder = Geocoder::new(&root, 100, Duration::from_secs(2)).unwrap();

    let first = geocoder.geocode("Calle Sierpes 1, Sevilla").await.unwrap();
    let second = geocoder.geocode("  calle sierpes 1,   SEVILLA ").await.unwrap();
    assert_eq!(first, Some(Coordinates::new(37.3886, -5.9823)));
    assert_eq!(first, second);
    assert_eq!(backend.geocode_hits.load(Ordering::SeqCst), 1);

    assert!(geocoder.geocode("nowhere at all").await.unwrap().is_none());
    assert!(geocoder.geocode("nowhere at all").await.unwrap().is_none());
    assert_eq!(backend.geocode_hits.load(Ordering::SeqCst), 3);
    assert_eq!(geocoder.cached_entries().await, 1);
}
