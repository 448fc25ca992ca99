use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, ClientEvent, OrderingApp};
use serde_json::{Map, Value};
use shared::domain::{CityId, EstablishmentDetails, EstablishmentId, NewOrder, User, UserId};
use storage::SqliteSessionStorage;
use tokio::sync::broadcast::Receiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured backend base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    session_database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Chooses `customer` or `establishment` for the signed-in user.
    SetRole { role: String },
    SetAddress { address: String },
    Logout,
    Whoami,
    Visit { path: String },
    #[command(subcommand)]
    Establishment(EstablishmentCommand),
    /// Lists establishments around the user, or around the given point.
    Nearby {
        #[arg(long)]
        city: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    Order {
        #[arg(long)]
        eid: i64,
        #[arg(long)]
        total: f64,
        /// Order line as JSON; plain text is kept as a string.
        #[arg(long = "item")]
        items: Vec<String>,
    },
    /// Order dashboard for the signed-in owner's establishment.
    Orders {
        #[arg(long)]
        eid: Option<i64>,
        #[arg(long)]
        from: Option<f64>,
        #[arg(long)]
        to: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum EstablishmentCommand {
    Show {
        #[arg(long)]
        uid: Option<i64>,
    },
    Create(DetailsArgs),
    Update(DetailsArgs),
}

#[derive(clap::Args, Debug)]
struct DetailsArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,
}

impl From<DetailsArgs> for EstablishmentDetails {
    fn from(args: DetailsArgs) -> Self {
        Self {
            name: args.name,
            address: args.address,
            lat: args.lat,
            lon: args.lon,
            attributes: Map::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    if let Some(url) = cli.session_database_url {
        settings.session_database_url = url;
    }

    let storage = SqliteSessionStorage::new(&settings.session_database_url).await?;
    storage.health_check().await?;
    info!(session = %settings.session_database_url, "session storage ready");
    let app = OrderingApp::new(settings, Arc::new(storage))?;
    let mut events = app
        .subscribe_events()
        .context("console requires the built-in event bus")?;

    let outcome = run(&app, cli.command).await;
    print_events(&mut events);
    outcome
}

async fn run(app: &OrderingApp, command: Command) -> Result<()> {
    // A corrupt stored identity is already reported; `login` overwrites it.
    let _ = app.auth.restore().await;

    match command {
        Command::Login {
            name,
            email,
            lat,
            lon,
        } => {
            let user = app.auth.login(&name, &email, lat, lon).await?;
            print_user(&user)?;
        }
        Command::SetRole { role } => {
            let user_type = app.auth.update_user_type(&role).await?;
            println!("role set to {user_type}");
        }
        Command::SetAddress { address } => {
            let user = app.auth.update_user_by_address(&address).await?;
            print_user(&user)?;
        }
        Command::Logout => {
            app.auth.logout().await?;
            println!("signed out");
        }
        Command::Whoami => match app.auth.current_user().await {
            Some(user) => print_user(&user)?,
            None => println!("not signed in"),
        },
        Command::Visit { path } => {
            let decision = app.visit(&path).await?;
            println!("{}", decision.destination());
        }
        Command::Establishment(command) => run_establishment(app, command).await?,
        Command::Nearby { city, lat, lon } => {
            let user = app.auth.current_user().await;
            let city = city
                .map(CityId)
                .or_else(|| user.as_ref().and_then(|user| user.cid.clone()))
                .context("no city given and the signed-in user has none")?;
            let lat = lat
                .or_else(|| user.as_ref().and_then(|user| user.lat))
                .context("no latitude available")?;
            let lon = lon
                .or_else(|| user.as_ref().and_then(|user| user.lon))
                .context("no longitude available")?;

            let nearby = app
                .establishments
                .get_establishments_by_city(city, lat, lon)
                .await?;
            println!("{}", serde_json::to_string_pretty(&nearby)?);
        }
        Command::Order { eid, total, items } => {
            let user = signed_in(app).await?;
            let order = NewOrder {
                uid: user.uid,
                eid: EstablishmentId(eid),
                cid: user.cid.context("set an address before ordering")?,
                lat: user.lat.context("set an address before ordering")?,
                lon: user.lon.context("set an address before ordering")?,
                items: items.iter().map(|item| parse_item(item)).collect(),
                total,
            };
            app.establishments.submit_order(order).await?;
        }
        Command::Orders { eid, from, to } => {
            let eid = match eid {
                Some(eid) => EstablishmentId(eid),
                None => owned_establishment_id(app).await?,
            };
            let stats = app.establishments.get_establishment_orders(eid).await?;
            println!(
                "orders: {}  customers: {}",
                stats.amt_orders, stats.amt_customers
            );

            let state = app.establishments.snapshot().await;
            if let (Some(first), Some(last)) = (from.or(state.first_ts), to.or(state.last_ts)) {
                let buckets = app
                    .establishments
                    .get_orders_between_first_and_last_ts(first, last)
                    .await;
                for bucket in buckets {
                    println!(
                        "#{:<4} {:>3} orders  total {:.2}",
                        bucket.index,
                        bucket.orders.len(),
                        bucket.total
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_establishment(app: &OrderingApp, command: EstablishmentCommand) -> Result<()> {
    match command {
        EstablishmentCommand::Show { uid } => {
            let uid = match uid {
                Some(uid) => UserId(uid),
                None => signed_in(app).await?.uid,
            };
            let establishment = app.establishments.get_establishment_by_uid(uid).await?;
            println!("{}", serde_json::to_string_pretty(&establishment)?);
        }
        EstablishmentCommand::Create(details) => {
            let uid = signed_in(app).await?.uid;
            let establishment = app
                .establishments
                .create_establishment(uid, details.into())
                .await?;
            println!("{}", serde_json::to_string_pretty(&establishment)?);
        }
        EstablishmentCommand::Update(changes) => {
            let uid = signed_in(app).await?.uid;
            app.establishments.get_establishment_by_uid(uid).await?;
            let establishment = app
                .establishments
                .update_establishment(uid, changes.into())
                .await?;
            println!("{}", serde_json::to_string_pretty(&establishment)?);
        }
    }
    Ok(())
}

async fn signed_in(app: &OrderingApp) -> Result<User> {
    app.auth
        .current_user()
        .await
        .context("not signed in; run `login` first")
}

async fn owned_establishment_id(app: &OrderingApp) -> Result<EstablishmentId> {
    let uid = signed_in(app).await?.uid;
    app.establishments
        .get_establishment_by_uid(uid)
        .await?
        .eid
        .context("establishment record has no eid")
}

fn parse_item(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_user(user: &User) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}

fn print_events(events: &mut Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::Notification(notification) => eprintln!(
                "[{}] {}",
                notification.summary, notification.detail
            ),
            ClientEvent::Navigated(route) => eprintln!("-> {route}"),
            ClientEvent::ReloadRequested => eprintln!("(reload)"),
        }
    }
}
