use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::RngCore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use formwork::auth::{Credentials, TokenService};
use formwork::config::{ServerConfig, load_secret, write_secret};
use formwork::idgen::ShortIdGenerator;
use formwork::registry::ShapeRegistry;
use formwork::server::{AppState, create_router};
use formwork::store::{SqliteStore, Store};
use formwork::types::{Role, User};
use formwork::validation::validate_user_name;

const ROOT_USER: &str = "root";

#[derive(Parser)]
#[command(name = "formwork")]
#[command(about = "A backend-as-a-service server with runtime-defined record shapes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags given here override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and signing secret
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Validity window of issued tokens, in seconds
        #[arg(long)]
        token_ttl_secs: Option<u64>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, signing secret and root user)
    Init {
        /// Data directory for the database and signing secret
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Issue a user token
    Token {
        /// Data directory for the database and signing secret
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Name of the user the token is for
        #[arg(long)]
        user: String,

        /// Validity window of the token, in seconds
        #[arg(long, default_value = "300")]
        ttl_secs: u64,
    },
}

fn random_password() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn open_store(data_dir: &Path) -> anyhow::Result<(ServerConfig, Arc<dyn Store>)> {
    let config = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    if !config.db_path().exists() {
        bail!("Server not initialized. Run 'formwork admin init' first to create the database.");
    }
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok((config, Arc::new(store)))
}

async fn create_user(
    store: &Arc<dyn Store>,
    name: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<User> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        role,
        active: true,
        password_hash: Some(Credentials::new().hash(password)?),
        repos: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let shape = ShapeRegistry::new(Arc::clone(store))
        .onboard(&user, &ShortIdGenerator)
        .await?;
    info!("Provisioned repo {} for {}", shape.name, user.name);

    Ok(user)
}

async fn run_init(data_dir: PathBuf, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(&data_dir)?;

    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_root_user()? {
        bail!(
            "Server already initialized. Database exists at: {}",
            config.db_path().display()
        );
    }

    let secret_file = config.secret_path();
    let secret = write_secret(&secret_file)?;

    let store: Arc<dyn Store> = Arc::new(store);
    let password = random_password();
    let root = create_user(&store, ROOT_USER, &password, Role::Root).await?;

    let tokens = TokenService::new(secret, config.token_ttl(), Arc::clone(&store));
    let token = tokens.sign_user_token(&root.id, root.role)?;

    println!();
    println!("========================================");
    println!("Root user created (save these, they won't be shown again):");
    println!();
    println!("  id:       {}", root.id);
    println!("  name:     {}", root.name);
    println!("  password: {password}");
    println!();
    println!("Token (valid for {}s):", config.token_ttl_secs);
    println!();
    println!("  {token}");
    println!();
    println!("Signing secret written to: {}", secret_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_default_admin_prompt(&store).await?;
    }

    Ok(())
}

async fn create_default_admin_prompt(store: &Arc<dyn Store>) -> anyhow::Result<()> {
    let create_admin = inquire::Confirm::new("Would you like to create a default admin user?")
        .with_default(false)
        .prompt()?;

    if !create_admin {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| match validate_user_name(input) {
            Ok(()) => Ok(inquire::validator::Validation::Valid),
            Err(msg) => Ok(inquire::validator::Validation::Invalid(msg.into())),
        })
        .prompt()?;

    let password = inquire::Password::new("Password:").prompt()?;

    let user = create_user(store, &username, &password, Role::Admin).await?;

    println!();
    println!("========================================");
    println!("Created admin '{}' ({})", user.name, user.id);
    println!("========================================");
    println!();

    Ok(())
}

fn run_token(data_dir: &Path, name: &str, ttl_secs: u64) -> anyhow::Result<()> {
    let (config, store) = open_store(data_dir)?;
    let secret = load_secret(&config.secret_path())
        .with_context(|| format!("failed to read {}", config.secret_path().display()))?;

    let Some(user) = store.get_user_by_name(name)? else {
        bail!("No user named '{name}'");
    };
    if !user.active {
        bail!("User '{name}' is inactive");
    }

    let tokens = TokenService::new(secret, std::time::Duration::from_secs(ttl_secs), store);
    println!("{}", tokens.sign_user_token(&user.id, user.role)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("formwork=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive).await?;
            }
            AdminCommands::Token {
                data_dir,
                user,
                ttl_secs,
            } => {
                run_token(&data_dir, &user, ttl_secs)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            token_ttl_secs,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::from_file(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(ttl) = token_ttl_secs {
                config.token_ttl_secs = ttl;
            }

            let secret_file = config.secret_path();
            if !secret_file.exists() {
                bail!(
                    "Server not initialized. Run 'formwork admin init' first to create the database and signing secret."
                );
            }
            let secret = load_secret(&secret_file)?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            if !store.has_root_user()? {
                bail!(
                    "Server not initialized. Run 'formwork admin init' first to create the root user."
                );
            }

            let addr = config.socket_addr()?;
            let store: Arc<dyn Store> = Arc::new(store);
            let state = Arc::new(AppState::new(Arc::clone(&store), secret, config));
            let app = create_router(state);

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutting down");
                })
                .await?;

            store.close()?;
        }
    }

    Ok(())
}
