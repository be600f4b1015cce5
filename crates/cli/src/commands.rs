// FILE: crates/cli/src/commands.rs

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::ArgMatches;
use console::style;
use futures::StreamExt;
use reparto_config::{ApiConfig, Config, ConfigManager};
use reparto_core::{
    Cart, DeliveryAddress, Order, OrderId, OrderStatus, Product, ProductId, Resource, Route,
    Session, SessionStore, Timestamp, UserId, UserRole,
};
use reparto_database::{connection::DatabaseConfig, CacheStore};
use reparto_network::{
    ApiClient, ClientConfig, ConnectivityChecker, Geocoder, GeocodingApi, HttpClient,
};
use reparto_repository::{categories, filter_by_category, search, Repositories};
use reparto_resilience::RetryPolicy;
use reparto_sync_engine::{
    Constraints, LocationTracker, SimulatedLocationSource, SyncScheduler, SyncSettings, SyncWorker,
    SYNC_WORK_KEY,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything resolved from config file, environment and flags
pub struct Settings {
    pub manager: ConfigManager,
    pub config: Config,
    pub database_path: PathBuf,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Open cache, HTTP client and repositories for one run
pub struct App {
    store: CacheStore,
    http: HttpClient,
    repos: Repositories,
}

impl App {
    pub async fn open(settings: &Settings) -> Result<Self> {
        if let Some(parent) = settings.database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }

        let store = CacheStore::open(DatabaseConfig::for_file(&settings.database_path))
            .await
            .context("Failed to open local cache")?;

        let session = SessionStore::new();
        let http = HttpClient::new(client_config(&settings.config.api), session.clone())
            .context("Invalid API configuration")?;

        let repos = Repositories::new(
            ApiClient::new(http.clone()),
            store.clone(),
            session,
            settings.manager.preferences(),
            geocoder(&settings.config.api),
        );

        Ok(Self { store, http, repos })
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

pub fn client_config(api: &ApiConfig) -> ClientConfig {
    ClientConfig::new(api.base_url.clone()).with_timeouts(
        api.connect_timeout(),
        api.read_timeout(),
        api.connect_timeout() + api.read_timeout() + api.write_timeout(),
    )
}

fn geocoder(api: &ApiConfig) -> Option<Arc<dyn GeocodingApi>> {
    match Geocoder::new(
        &api.geocoding_url,
        api.geocoding_cache_capacity,
        api.read_timeout(),
    ) {
        Ok(geocoder) => Some(Arc::new(geocoder)),
        Err(e) => {
            log::warn!("Geocoding disabled: {}", e);
            None
        }
    }
}

/// Unwraps a repository result, turning `Error` into a failed command
pub fn settle<T>(resource: Resource<T>, action: &str) -> Result<T> {
    match resource {
        Resource::Success(value) => Ok(value),
        Resource::Error(message) => bail!("{} failed: {}", action, message),
        Resource::Loading => bail!("{} did not complete", action),
    }
}

/// Signs in with the configured credentials, if any
async fn sign_in(app: &App, settings: &Settings) -> Result<Option<Session>> {
    match (settings.email.as_deref(), settings.password.as_deref()) {
        (Some(email), Some(password)) => {
            let session = settle(app.repos.auth.login(email, password).await, "Sign-in")?;
            Ok(Some(session))
        }
        _ => Ok(None),
    }
}

async fn require_session(app: &App, settings: &Settings) -> Result<Session> {
    sign_in(app, settings).await?.ok_or_else(|| {
        let hint = match app.repos.auth.remembered_user() {
            Some(user) => format!(" (last signed in as {})", user.email),
            None => String::new(),
        };
        anyhow!(
            "Sign-in required{}: pass --email and --password or set REPARTO_EMAIL and REPARTO_PASSWORD",
            hint
        )
    })
}

pub async fn login(app: &App, settings: &Settings) -> Result<()> {
    let session = require_session(app, settings).await?;
    println!(
        "{} Signed in as {} <{}> ({})",
        style("✓").green().bold(),
        style(&session.name).bold(),
        session.email,
        session.role
    );
    Ok(())
}

// ===== Catalog =====

pub async fn list_products(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    if matches.get_flag("refresh") {
        sign_in(app, settings).await?;
        let cached = settle(app.repos.products.refresh_products().await, "Catalog refresh")?;
        println!("{} {} products downloaded", style("✓").green().bold(), cached);
    }

    let mut products = settle(app.repos.products.cached_products().await, "Reading catalog")?;
    if let Some(category) = matches.get_one::<String>("category") {
        products = filter_by_category(&products, category);
    }
    if let Some(query) = matches.get_one::<String>("search") {
        products = search(&products, query);
    }

    if products.is_empty() {
        println!("No products found. Use 'products --refresh' or 'sync' to download the catalog.");
        return Ok(());
    }

    println!("\n{} Products", style(products.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for product in &products {
        print_product(product);
    }
    Ok(())
}

pub async fn list_categories(app: &App) -> Result<()> {
    let products = settle(app.repos.products.cached_products().await, "Reading catalog")?;
    let names = categories(&products);
    if names.is_empty() {
        println!("No cached products. Use 'products --refresh' first.");
        return Ok(());
    }

    for name in names {
        let count = products
            .iter()
            .filter(|p| p.category.eq_ignore_ascii_case(&name))
            .count();
        println!("{} ({})", style(name).bold(), count);
    }
    Ok(())
}

// ===== Orders =====

pub async fn place_order(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let session = require_session(app, settings).await?;
    let items = parse_items(matches.get_many::<String>("item").into_iter().flatten())?;

    let mut cart = Cart::new();
    for (product_id, quantity) in items {
        let product = settle(
            app.repos.products.get_product(product_id).await,
            &format!("Loading product {}", product_id),
        )?;
        let name = product.name.clone();
        let stock = product.stock;

        if !cart.add_product(product) {
            bail!("{} (product {}) is out of stock", name, product_id);
        }
        let wanted = quantity.min(stock);
        if wanted < quantity {
            println!(
                "{} Only {} of {} in stock, ordering {}",
                style("!").yellow().bold(),
                stock,
                name,
                wanted
            );
        }
        cart.set_quantity(product_id, wanted);
    }

    for item in cart.items() {
        println!(
            "  {:>3} x {:<30} {:>10}",
            item.quantity,
            truncate(&item.product.name, 30),
            item.line_total()
        );
    }
    println!("  Subtotal: {}", cart.subtotal());
    println!("  Tax:      {}", cart.tax());
    println!("  Total:    {}", style(cart.total()).bold());

    let requested_lines = cart.line_count();
    let address = DeliveryAddress::new(
        arg(matches, "address")?,
        arg(matches, "city")?,
        arg(matches, "postal-code")?,
    );
    let notes = matches.get_one::<String>("notes").cloned();

    let order = settle(
        app.repos
            .orders
            .checkout(&mut cart, session.user_id, address, notes)
            .await,
        "Checkout",
    )?;

    println!(
        "{} Order {} placed for {}",
        style("✓").green().bold(),
        style(order.id).bold(),
        order.address.one_line()
    );
    if order.lines.len() < requested_lines {
        println!(
            "{} Only {} of {} lines were accepted by the server",
            style("!").yellow().bold(),
            order.lines.len(),
            requested_lines
        );
    }
    Ok(())
}

pub async fn list_orders(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let session = require_session(app, settings).await?;
    let orders = &app.repos.orders;

    let resource = if let Some(&customer) = matches.get_one::<UserId>("customer") {
        orders.orders_for_customer(customer).await
    } else if let Some(&courier) = matches.get_one::<UserId>("courier") {
        orders.orders_for_courier(courier).await
    } else if matches.get_flag("pending") {
        orders.pending_orders().await
    } else {
        match session.role {
            UserRole::Customer => orders.orders_for_customer(session.user_id).await,
            UserRole::Courier => orders.orders_for_courier(session.user_id).await,
            UserRole::Admin => orders.list_orders().await,
        }
    };
    let list = settle(resource, "Listing orders")?;

    if list.is_empty() {
        println!("No orders found.");
        return Ok(());
    }

    println!("\n{} Orders", style(list.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for order in &list {
        print_order(order);
    }
    Ok(())
}

pub async fn advance_order(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    require_session(app, settings).await?;
    let id = order_arg(matches)?;

    let order = settle(app.repos.orders.get_order(id).await, "Loading order")?;
    let next = settle(app.repos.orders.advance_status(&order).await, "Advancing order")?;
    println!(
        "{} Order {}: {} -> {}",
        style("✓").green().bold(),
        id,
        order.status,
        style(next).bold()
    );
    Ok(())
}

pub async fn set_order_status(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let id = order_arg(matches)?;
    let status = parse_status(&arg(matches, "status")?)?;
    require_session(app, settings).await?;

    settle(app.repos.orders.set_status(id, status).await, "Updating order")?;
    println!("{} Order {} is now {}", style("✓").green().bold(), id, status);
    Ok(())
}

// ===== Routes =====

pub async fn list_routes(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let courier = matches.get_one::<UserId>("courier").copied();

    if matches.get_flag("refresh") {
        sign_in(app, settings).await?;
        let cached = settle(app.repos.routes.refresh_routes(courier).await, "Route refresh")?;
        println!("{} {} routes downloaded", style("✓").green().bold(), cached);
    }

    let mut snapshots = match courier {
        Some(courier) => app.repos.routes.observe_courier_routes(courier),
        None => app.repos.routes.observe_routes(),
    };
    let routes = snapshots
        .next()
        .await
        .transpose()
        .context("Failed to read cached routes")?
        .unwrap_or_default();

    if routes.is_empty() {
        println!("No routes found. Use 'routes --refresh' to download them.");
        return Ok(());
    }

    for route in &routes {
        print_route(route);
        let stops = settle(app.repos.routes.route_orders(route.id).await, "Reading stops")?;
        for (position, order) in stops.iter().enumerate() {
            println!(
                "    {}. order {} [{}] {}",
                position + 1,
                order.id,
                order.status,
                order.address.one_line()
            );
        }
        let missing = route.order_count().saturating_sub(stops.len());
        if missing > 0 {
            println!("    ({} stops not cached)", missing);
        }
    }
    Ok(())
}

pub async fn assign_route(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let courier = *matches
        .get_one::<UserId>("courier")
        .ok_or_else(|| anyhow!("Courier is required"))?;
    let order_ids = parse_order_ids(&arg(matches, "orders")?)?;
    let date = parse_date(&arg(matches, "date")?)?;
    let distance = matches.get_one::<f64>("distance").copied().unwrap_or_default();
    let duration = matches.get_one::<u32>("duration").copied().unwrap_or_default();
    require_session(app, settings).await?;

    let assignment = settle(
        app.repos
            .routes
            .assign_orders(courier, date, order_ids, distance, duration)
            .await,
        "Assigning route",
    )?;

    println!(
        "{} Route {} created for courier {} on {}",
        style("✓").green().bold(),
        style(assignment.route.id).bold(),
        courier,
        assignment.route.scheduled_date
    );
    println!("  Assigned: {}", join_ids(&assignment.assigned));
    if !assignment.failed.is_empty() {
        println!(
            "  {} {}",
            style("Failed:").red().bold(),
            join_ids(&assignment.failed)
        );
    }
    Ok(())
}

pub async fn list_couriers(app: &App, settings: &Settings) -> Result<()> {
    require_session(app, settings).await?;
    let couriers = settle(app.repos.users.list_couriers().await, "Listing couriers")?;

    if couriers.is_empty() {
        println!("No couriers registered.");
        return Ok(());
    }
    for courier in couriers {
        print!("{:>5}  {:<25} {}", courier.id, courier.name, courier.email);
        if let Some(phone) = &courier.phone {
            print!("  {}", phone);
        }
        println!();
    }
    Ok(())
}

// ===== Background work =====

pub async fn sync(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    sign_in(app, settings).await?;
    let sync_config = &settings.config.sync;

    let api = Arc::new(ApiClient::new(app.http.clone()));
    let worker = SyncWorker::new(
        app.store.clone(),
        api.clone(),
        api,
        SyncSettings {
            max_retries: sync_config.max_retries as usize,
            ping_retention_hours: u64::from(sync_config.ping_retention_hours),
        },
    );

    if !matches.get_flag("daemon") {
        let report = worker.run_once().await.context("Sync failed")?;
        println!("{} {}", style("✓").green().bold(), report.summary());
        return Ok(());
    }

    let policy = RetryPolicy::with_retries(
        sync_config.max_retries as usize,
        sync_config.initial_backoff(),
    );
    let probe = Arc::new(ConnectivityChecker::new(app.http.clone()));
    let scheduler = SyncScheduler::new(probe, policy).context("Invalid retry policy")?;
    let constraints = if sync_config.requires_network {
        Constraints::network()
    } else {
        Constraints::default()
    };

    scheduler
        .enqueue_unique_periodic(
            SYNC_WORK_KEY,
            sync_config.interval(),
            constraints,
            Arc::new(worker),
        )
        .context("Failed to schedule sync")?;
    println!(
        "Syncing every {} minutes. Press Ctrl-C to stop.",
        sync_config.interval_minutes
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    if let Some(info) = scheduler.work_info(SYNC_WORK_KEY) {
        log::info!("Last sync state: {:?}", info.state);
    }
    scheduler.shutdown();
    println!("Sync stopped.");
    Ok(())
}

pub async fn track(app: &App, settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let courier = *matches
        .get_one::<UserId>("courier")
        .ok_or_else(|| anyhow!("Courier is required"))?;
    let tracking = &settings.config.tracking;
    let interval = matches
        .get_one::<u64>("interval")
        .map(|secs| Duration::from_secs(*secs))
        .unwrap_or_else(|| tracking.interval());

    if !(matches.get_flag("simulate") || tracking.simulate) {
        bail!("No position source available; pass --simulate or set tracking.simulate = true");
    }
    sign_in(app, settings).await?;

    let tracker = LocationTracker::new(
        app.store.clone(),
        Arc::new(ApiClient::new(app.http.clone())),
        Arc::new(SimulatedLocationSource::madrid()),
        courier,
        interval,
    );
    let handle = tracker.start();
    println!(
        "Tracking courier {} every {}s. Press Ctrl-C to stop.",
        courier,
        interval.as_secs()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    let stats = handle.stop().await;
    println!(
        "{} {} positions recorded, {} sent, {} queued for sync",
        style("✓").green().bold(),
        stats.recorded,
        stats.sent,
        stats.recorded.saturating_sub(stats.sent)
    );
    Ok(())
}

// ===== Local state =====

pub async fn show_cache(app: &App) -> Result<()> {
    let counts = app
        .store
        .counts()
        .await
        .context("Failed to count cached rows")?;

    println!("\n{}", style("Local Cache").bold().cyan());
    println!("{}", "=".repeat(40));
    println!("Products:       {}", counts.products);
    println!("Users:          {}", counts.users);
    println!("Orders:         {}", counts.orders);
    println!("Order lines:    {}", counts.order_lines);
    println!("Routes:         {}", counts.routes);
    println!("Route stops:    {}", counts.route_orders);
    println!(
        "Pings:          {} ({} pending)",
        counts.location_pings, counts.pending_pings
    );
    Ok(())
}

pub fn config_init(settings: &Settings) -> Result<()> {
    let path = settings.manager.config_path();
    let created = settings
        .manager
        .initialize()
        .context("Failed to write config file")?;

    if created {
        println!("{} Wrote {}", style("✓").green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

pub fn config_show(settings: &Settings) -> Result<()> {
    let rendered =
        toml::to_string_pretty(&settings.config).context("Failed to render configuration")?;
    println!("# {}", settings.manager.config_path().display());
    println!("# cache: {}", settings.database_path.display());
    println!();
    print!("{}", rendered);
    Ok(())
}

// ===== Parsing =====

/// Parses `ID:QTY`; a bare `ID` means one unit
pub fn parse_item(raw: &str) -> Result<(ProductId, u32)> {
    let (id, quantity) = match raw.split_once(':') {
        Some((id, quantity)) => (id, quantity),
        None => (raw, "1"),
    };

    let id: ProductId = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid product id in '{}'", raw))?;
    let quantity: u32 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in '{}'", raw))?;
    if quantity == 0 {
        bail!("Quantity must be positive in '{}'", raw);
    }
    Ok((id, quantity))
}

/// Parses every `--item`, adding up repeated products in first-seen order
pub fn parse_items<'a, I>(values: I) -> Result<Vec<(ProductId, u32)>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut order: Vec<ProductId> = Vec::new();
    let mut totals: HashMap<ProductId, u32> = HashMap::new();

    for raw in values {
        let (id, quantity) = parse_item(raw)?;
        let total = totals.entry(id).or_insert_with(|| {
            order.push(id);
            0
        });
        *total = total.saturating_add(quantity);
    }

    if order.is_empty() {
        bail!("At least one --item is required");
    }
    Ok(order.into_iter().map(|id| (id, totals[&id])).collect())
}

pub fn parse_order_ids(raw: &str) -> Result<Vec<OrderId>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OrderId>()
                .with_context(|| format!("Invalid order id '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;

    if ids.is_empty() {
        bail!("No order ids given");
    }
    Ok(ids)
}

/// Midnight UTC of a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<Timestamp> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date '{}'", raw))?;
    Ok(Timestamp::from_millis(midnight.and_utc().timestamp_millis()))
}

pub fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::parse(raw).ok_or_else(|| {
        anyhow!(
            "Unknown status '{}', expected pending, prepared, in-delivery or delivered",
            raw
        )
    })
}

fn arg(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("--{} is required", name))
}

fn order_arg(matches: &ArgMatches) -> Result<OrderId> {
    matches
        .get_one::<OrderId>("order")
        .copied()
        .ok_or_else(|| anyhow!("Order id is required"))
}

// ===== Output =====

fn print_product(product: &Product) {
    println!(
        "{:>5}  {:<30} {:>10}  stock {:>4}  {}",
        product.id,
        style(truncate(&product.name, 30)).bold(),
        product.price,
        product.stock,
        style(&product.category).dim()
    );
}

fn print_order(order: &Order) {
    let courier = order
        .courier_id
        .map(|id| format!("courier {}", id))
        .unwrap_or_else(|| "unassigned".to_string());
    println!(
        "{:>5}  {:<12} customer {:<5} {:<14} {}",
        order.id,
        style(order.status).bold(),
        order.customer_id,
        courier,
        order.created_at
    );
    println!("       {}", order.address.one_line());
    if let Some(notes) = &order.notes {
        println!("       {}", style(truncate(notes, 70)).dim());
    }
}

fn print_route(route: &Route) {
    println!(
        "\nRoute {} [{}] courier {} on {}: {} stops, {:.1} km, {} min",
        style(route.id).bold(),
        route.status,
        route.courier_id,
        route.scheduled_date,
        route.order_count(),
        route.estimated_distance_km,
        route.estimated_duration_min
    );
}

fn join_ids(ids: &[OrderId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests;
