use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use techblog_auth::{
    AppState, AuthConfig, DatabaseConfig, ServerConfig, TokenService, UserStore,
    config::{DEFAULT_CORS_ORIGIN, DEFAULT_LOOKUP_TIMEOUT_MS},
    create_connection, create_router, ensure_schema,
};

#[derive(Parser)]
#[command(name = "techblog-auth")]
#[command(about = "Tech blog API with token authentication and owner-only edits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the blog REST server
    Server {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, default_value = "memory")]
        db_url: String,
        /// HS256 signing secret (at least 32 bytes)
        #[arg(long, env = "TECHBLOG_JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
        /// Frontend origin allowed by CORS
        #[arg(long, env = "TECHBLOG_CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
        cors_origin: String,
        /// Upper bound for resolving a token subject, in milliseconds
        #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT_MS)]
        lookup_timeout_ms: u64,
        /// Seed an account on startup if it does not exist yet
        #[arg(long, env = "TECHBLOG_SEED_EMAIL")]
        seed_email: Option<String>,
        #[arg(long, env = "TECHBLOG_SEED_PASSWORD", hide_env_values = true)]
        seed_password: Option<String>,
        #[arg(long, default_value = "Admin")]
        seed_name: String,
    },
    /// Initialize the database
    Init {
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
    /// Create a user account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "TECHBLOG_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
}

/// `RUST_LOG` directives plus the crate defaults. This filter alone decides
/// what is logged; no global max level is layered on top.
fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("techblog_auth=info".parse()?)
        .add_directive("tower_http=info".parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(log_filter()?).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            bind,
            db_url,
            jwt_secret,
            cors_origin,
            lookup_timeout_ms,
            seed_email,
            seed_password,
            seed_name,
        } => {
            let auth_config = AuthConfig {
                jwt_secret,
                lookup_timeout_ms,
            };
            auth_config.validate()?;
            let server_config = ServerConfig { bind, cors_origin };

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for REST server: {}", db_config.url);

            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;

            let users = UserStore::new(db.clone());
            match (seed_email, seed_password) {
                (Some(email), Some(password)) => {
                    if users.ensure_user(&email, &seed_name, &password).await? {
                        info!("Seeded user {}", email);
                    }
                }
                (Some(email), None) => warn!("Seed email {} given without a password; skipping", email),
                _ => {}
            }

            let tokens = TokenService::new(&auth_config)?;
            let state = AppState::new(db, users, tokens, &auth_config);
            let app = create_router(state, &server_config.cors_origin)?;

            let listener = tokio::net::TcpListener::bind(&server_config.bind).await?;
            info!("Blog API listening on http://{}", server_config.bind);
            info!("Allowing CORS origin {}", server_config.cors_origin);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser {
            email,
            name,
            password,
            db_url,
        } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;

            let users = UserStore::new(db);
            let user = users.create_user(&email, &name, &password).await?;

            println!();
            println!("User created");
            println!("  Email: {}", user.email);
            println!("  Name:  {}", user.name);
            println!("  ID:    {}", user.id);
        }
    }

    Ok(())
}
