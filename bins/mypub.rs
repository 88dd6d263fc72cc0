use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use migration::schema::USERS;
use models::User;
use service::auth::domain::RegisterInput;
use service::locations::LocationService;
use service::user_admin::UserAdminService;
use store::LocalStore;
use tracing::{error, info};
use uuid::Uuid;

/// mypub store maintenance.
#[derive(Parser, Debug)]
#[command(name = "mypub", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show schema version, collections and record counts.
    Status,
    /// Insert the default countries that are missing.
    Seed,
    /// List registered users.
    Users,
    /// Create a developer account.
    ProvisionDeveloper {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "MYPUB_DEVELOPER_PASSWORD")]
        password: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        phone: String,
    },
}

fn main() -> ExitCode {
    // load .env before anything reads RUST_LOG or MYPUB_*
    dotenv().ok();
    let cli = Cli::parse();

    let cfg = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(service = "mypub", event = "config_invalid", error = %e, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    common::utils::logging::init_logging(&cfg.logging.format);

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    std::panic::set_hook(Box::new(move |info| {
        error!(service = "mypub", event = "panic", %run_id, pid, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "mypub", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(service = "mypub", event = "start", %run_id, pid, version = env!("CARGO_PKG_VERSION"), "starting");
    rt.block_on(async move {
        if cfg.store.engine == configs::StoreEngine::File {
            if let Err(e) = common::env::ensure_data_dir(&cfg.store.data_dir).await {
                error!(service = "mypub", event = "data_dir_failed", error = %e, "data directory unusable");
                return ExitCode::FAILURE;
            }
        }
        let registry = service::runtime::registry_for(&cfg.store);
        let store = match service::runtime::open_store(&registry, &cfg.store).await {
            Ok(store) => store,
            Err(e) => {
                error!(service = "mypub", event = "open_failed", code = e.code(), error = %e, "cannot open store");
                return ExitCode::FAILURE;
            }
        };
        match run(cli.command, store).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(service = "mypub", event = "command_failed", error = %e, "command failed");
                ExitCode::FAILURE
            }
        }
    })
}

async fn run(command: Commands, store: LocalStore) -> Result<()> {
    match command {
        Commands::Status => {
            println!("{} v{}", store.name(), store.version());
            for name in store.collection_names() {
                println!("  {name:<10} {}", store.count(name).await?);
            }
        }
        Commands::Seed => {
            let inserted = LocationService::new(store).seed_defaults().await?;
            println!("{inserted} countries added");
        }
        Commands::Users => {
            let users: Vec<User> = store.get_all(USERS).await?;
            for u in users {
                let flag = if u.is_blocked { " [blocked]" } else { "" };
                println!("{:<32} {:<24} {:?}{flag}", u.email, u.full_name, u.role);
            }
        }
        Commands::ProvisionDeveloper { email, name, password, country, city, street, phone } => {
            LocationService::new(store.clone()).seed_defaults().await?;
            let input = RegisterInput { email, full_name: name, password, country, city, street, phone };
            let user = UserAdminService::new(store).provision_developer(input).await?;
            println!("developer {} created", user.email);
        }
    }
    Ok(())
}
