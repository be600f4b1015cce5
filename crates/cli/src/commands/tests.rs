use super::*;
use reparto_core::Decimal;
use tempfile::TempDir;

fn settings_in(dir: &TempDir) -> Settings {
    let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();
    let config = Config::default();
    let database_path = manager.database_path(&config);
    Settings {
        manager,
        config,
        database_path,
        email: None,
        password: None,
    }
}

#[test]
fn test_parse_item() {
    assert_eq!(parse_item("12:3").unwrap(), (12, 3));
    assert_eq!(parse_item(" 7 : 2 ").unwrap(), (7, 2));
    assert_eq!(parse_item("5").unwrap(), (5, 1));
    assert!(parse_item("5:0").is_err());
    assert!(parse_item("abc:1").is_err());
    assert!(parse_item("5:-1").is_err());
}

#[test]
fn test_parse_items_merges_repeats_in_order() {
    let raw: Vec<String> = ["4:1", "1:2", "4:2"].iter().map(|s| s.to_string()).collect();
    assert_eq!(parse_items(&raw).unwrap(), vec![(4, 3), (1, 2)]);

    let none: Vec<String> = Vec::new();
    assert!(parse_items(&none).is_err());
}

#[test]
fn test_parse_order_ids() {
    assert_eq!(parse_order_ids("3, 1,2").unwrap(), vec![3, 1, 2]);
    assert_eq!(parse_order_ids("9,").unwrap(), vec![9]);
    assert!(parse_order_ids(" , ").is_err());
    assert!(parse_order_ids("1,x").is_err());
}

#[test]
fn test_parse_date_is_midnight_utc() {
    let ts = parse_date("2026-10-18").unwrap();
    assert_eq!(ts.as_millis(), 1_792_281_600_000);
    assert!(parse_date("18/10/2026").is_err());
    assert!(parse_date("2026-02-30").is_err());
}

#[test]
fn test_parse_status_accepts_both_vocabularies() {
    assert_eq!(parse_status("delivered").unwrap(), OrderStatus::Delivered);
    assert_eq!(parse_status("Entregado").unwrap(), OrderStatus::Delivered);
    assert_eq!(parse_status("pending").unwrap(), OrderStatus::Pending);
    assert!(parse_status("lost").is_err());
}

#[test]
fn test_settle() {
    assert_eq!(settle(Resource::Success(5), "Counting").unwrap(), 5);

    let err = settle::<()>(Resource::Error("No internet".to_string()), "Refresh").unwrap_err();
    assert_eq!(err.to_string(), "Refresh failed: No internet");

    assert!(settle::<()>(Resource::Loading, "Refresh").is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("12345678", 8), "12345678");
    assert_eq!(truncate("123456789", 8), "12345678...");
    assert_eq!(truncate("Panadería fina", 9), "Panadería...");
}

#[test]
fn test_client_config_uses_api_section() {
    let mut api = ApiConfig::default();
    api.base_url = "http://backend:8080/api/".to_string();
    api.connect_timeout_secs = 5;
    api.read_timeout_secs = 10;
    api.write_timeout_secs = 15;

    let client = client_config(&api);
    assert_eq!(client.base_url, "http://backend:8080/api/");
    assert_eq!(client.connect_timeout, Duration::from_secs(5));
    assert_eq!(client.read_timeout, Duration::from_secs(10));
    assert_eq!(client.timeout, Duration::from_secs(30));
}

#[test]
fn test_config_init_writes_once() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    config_init(&settings).unwrap();
    assert!(settings.manager.config_path().exists());
    let written = std::fs::read_to_string(settings.manager.config_path()).unwrap();

    config_init(&settings).unwrap();
    assert_eq!(
        std::fs::read_to_string(settings.manager.config_path()).unwrap(),
        written
    );
    config_show(&settings).unwrap();
}

#[tokio::test]
async fn test_app_opens_cache_under_config_dir() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let app = App::open(&settings).await.unwrap();
    assert!(settings.database_path.starts_with(dir.path()));
    show_cache(&app).await.unwrap();
    app.close().await;

    assert!(settings.database_path.exists());
}

#[tokio::test]
async fn test_catalog_commands_work_offline() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let app = App::open(&settings).await.unwrap();

    app.store
        .upsert_products(&[
            Product::new(1, "Agua", Decimal::new(60, 2), 10, "Bebidas"),
            Product::new(2, "Pan", Decimal::new(150, 2), 4, "Panadería"),
        ])
        .await
        .unwrap();

    list_categories(&app).await.unwrap();
    let cached = settle(app.repos.products.cached_products().await, "Reading").unwrap();
    assert_eq!(categories(&cached).len(), 2);
    app.close().await;
}

#[tokio::test]
async fn test_commands_needing_an_account_ask_for_credentials() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let app = App::open(&settings).await.unwrap();

    let err = require_session(&app, &settings).await.unwrap_err();
    assert!(err.to_string().contains("REPARTO_EMAIL"));
    assert!(sign_in(&app, &settings).await.unwrap().is_none());
    app.close().await;
}
