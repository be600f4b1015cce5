// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use reparto_config::ConfigManager;
use std::path::PathBuf;

mod commands;

fn build_cli() -> Command {
    Command::new("reparto")
        .version(env!("CARGO_PKG_VERSION"))
        .author("DrTomLLC")
        .about("Warehouse and delivery client: catalog, orders, routes and courier tracking")
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml and preferences")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the local cache database")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .value_name("URL")
                .help("Backend base URL")
                .global(true),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .env("REPARTO_EMAIL")
                .help("Account email, used to sign in for this run")
                .global(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .env("REPARTO_PASSWORD")
                .hide_env_values(true)
                .help("Account password")
                .global(true),
        )
        .subcommand(Command::new("login").about("Check credentials and remember the user"))
        .subcommand(
            Command::new("products")
                .about("List cached products")
                .arg(
                    Arg::new("search")
                        .short('s')
                        .long("search")
                        .value_name("QUERY")
                        .help("Match name, description or category"),
                )
                .arg(
                    Arg::new("category")
                        .short('c')
                        .long("category")
                        .value_name("CATEGORY")
                        .help("Only this category"),
                )
                .arg(
                    Arg::new("refresh")
                        .short('r')
                        .long("refresh")
                        .help("Download the catalog before listing")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("categories").about("List categories of cached products"))
        .subcommand(
            Command::new("order")
                .about("Place an order as the signed-in customer")
                .arg(
                    Arg::new("item")
                        .short('i')
                        .long("item")
                        .value_name("ID:QTY")
                        .help("Product and quantity, repeatable")
                        .required(true)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("address")
                        .long("address")
                        .value_name("STREET")
                        .required(true)
                        .help("Street and number"),
                )
                .arg(Arg::new("city").long("city").value_name("CITY").required(true).help("City"))
                .arg(
                    Arg::new("postal-code")
                        .long("postal-code")
                        .value_name("CODE")
                        .required(true)
                        .help("Postal code"),
                )
                .arg(Arg::new("notes").long("notes").value_name("TEXT").help("Delivery notes")),
        )
        .subcommand(
            Command::new("orders")
                .about("List orders; defaults to the signed-in user's own")
                .arg(
                    Arg::new("customer")
                        .long("customer")
                        .value_name("USER_ID")
                        .value_parser(value_parser!(i64))
                        .help("Orders of this customer"),
                )
                .arg(
                    Arg::new("courier")
                        .long("courier")
                        .value_name("USER_ID")
                        .value_parser(value_parser!(i64))
                        .help("Orders assigned to this courier"),
                )
                .arg(
                    Arg::new("pending")
                        .long("pending")
                        .help("Only pending orders")
                        .action(ArgAction::SetTrue),
                )
                .group(clap::ArgGroup::new("filter").args(["customer", "courier", "pending"])),
        )
        .subcommand(
            Command::new("advance")
                .about("Move an order to its next status")
                .arg(
                    Arg::new("order")
                        .required(true)
                        .value_name("ORDER_ID")
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Set an order's status")
                .arg(
                    Arg::new("order")
                        .required(true)
                        .value_name("ORDER_ID")
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("status")
                        .required(true)
                        .value_name("STATUS")
                        .help("pending, prepared, in-delivery or delivered"),
                ),
        )
        .subcommand(
            Command::new("routes")
                .about("List cached routes with their stops")
                .arg(
                    Arg::new("courier")
                        .long("courier")
                        .value_name("USER_ID")
                        .value_parser(value_parser!(i64))
                        .help("Only this courier's routes"),
                )
                .arg(
                    Arg::new("refresh")
                        .short('r')
                        .long("refresh")
                        .help("Download routes before listing")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("assign")
                .about("Create a route assigning orders to a courier")
                .arg(
                    Arg::new("courier")
                        .long("courier")
                        .value_name("USER_ID")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("orders")
                        .long("orders")
                        .value_name("IDS")
                        .required(true)
                        .help("Comma-separated order ids, in stop order"),
                )
                .arg(
                    Arg::new("date")
                        .long("date")
                        .value_name("YYYY-MM-DD")
                        .required(true)
                        .help("Scheduled date"),
                )
                .arg(
                    Arg::new("distance")
                        .long("distance")
                        .value_name("KM")
                        .value_parser(value_parser!(f64))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .value_name("MINUTES")
                        .value_parser(value_parser!(u32))
                        .default_value("0"),
                ),
        )
        .subcommand(Command::new("couriers").about("List couriers"))
        .subcommand(
            Command::new("sync")
                .about("Refresh the catalog and upload queued location pings")
                .arg(
                    Arg::new("daemon")
                        .long("daemon")
                        .help("Keep syncing periodically until interrupted")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("track")
                .about("Record courier positions until interrupted")
                .arg(
                    Arg::new("courier")
                        .long("courier")
                        .value_name("USER_ID")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("simulate")
                        .long("simulate")
                        .help("Use a simulated position source")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(u64))
                        .help("Seconds between samples"),
                ),
        )
        .subcommand(Command::new("cache").about("Show row counts of the local cache"))
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand_required(true)
                .subcommand(
                    Command::new("init").about("Write a default config file if none exists"),
                )
                .subcommand(Command::new("show").about("Print the effective configuration")),
        )
}

/// Config file, then `REPARTO_*` env vars, then command-line flags
fn load_settings(matches: &ArgMatches) -> Result<commands::Settings> {
    let manager = match matches.get_one::<PathBuf>("config-dir") {
        Some(dir) => ConfigManager::with_directory(dir.clone()),
        None => ConfigManager::new(),
    }
    .context("Failed to locate config directory")?;

    let mut config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;

    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api.base_url = url.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("database") {
        config.app.database_path = path.clone();
    }

    let database_path = manager.database_path(&config);
    Ok(commands::Settings {
        manager,
        config,
        database_path,
        email: matches.get_one::<String>("email").cloned(),
        password: matches.get_one::<String>("password").cloned(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let settings = load_settings(&matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.config.app.log_level.to_string()),
    )
    .init();

    match matches.subcommand() {
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&settings),
            Some(("show", _)) => commands::config_show(&settings),
            _ => anyhow::bail!("Missing config action, expected 'init' or 'show'"),
        },
        Some(("cache", _)) => {
            let app = commands::App::open(&settings).await?;
            commands::show_cache(&app).await
        }
        Some((name, sub_matches)) => {
            let app = commands::App::open(&settings).await?;
            let result = match name {
                "login" => commands::login(&app, &settings).await,
                "products" => commands::list_products(&app, &settings, sub_matches).await,
                "categories" => commands::list_categories(&app).await,
                "order" => commands::place_order(&app, &settings, sub_matches).await,
                "orders" => commands::list_orders(&app, &settings, sub_matches).await,
                "advance" => commands::advance_order(&app, &settings, sub_matches).await,
                "status" => commands::set_order_status(&app, &settings, sub_matches).await,
                "routes" => commands::list_routes(&app, &settings, sub_matches).await,
                "assign" => commands::assign_route(&app, &settings, sub_matches).await,
                "couriers" => commands::list_couriers(&app, &settings).await,
                "sync" => commands::sync(&app, &settings, sub_matches).await,
                "track" => commands::track(&app, &settings, sub_matches).await,
                other => Err(anyhow::anyhow!("Unknown command: {}", other)),
            };
            app.close().await;
            result
        }
        None => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_options_reach_subcommands() {
        let matches = build_cli()
            .try_get_matches_from([
                "reparto",
                "orders",
                "--pending",
                "--api-url",
                "http://backend/api/",
                "--email",
                "ana@example.com",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<String>("api-url").map(String::as_str),
            Some("http://backend/api/")
        );
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "orders");
        assert!(sub.get_flag("pending"));
    }

    #[test]
    fn test_order_filters_are_exclusive() {
        let result = build_cli().try_get_matches_from([
            "reparto", "orders", "--pending", "--courier", "7",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_accepts_repeated_items() {
        let matches = build_cli()
            .try_get_matches_from([
                "reparto",
                "order",
                "--item",
                "1:2",
                "--item",
                "4:1",
                "--address",
                "Calle Mayor 1",
                "--city",
                "Madrid",
                "--postal-code",
                "28013",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let items: Vec<&String> = sub.get_many::<String>("item").unwrap().collect();
        assert_eq!(items, ["1:2", "4:1"]);
    }

    #[test]
    fn test_config_requires_action() {
        assert!(build_cli()
            .try_get_matches_from(["reparto", "config"])
            .is_err());
    }
}
