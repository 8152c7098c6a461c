use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ledgerdash::actions::PruneExpiredAction;
use ledgerdash::api::axum::{AppState, router};
use ledgerdash::audit::AuditLogger;
use ledgerdash::config::{DashboardConfig, SmtpConfig};
use ledgerdash::crypto::Argon2Hasher;
use ledgerdash::email::SmtpMailer;
use ledgerdash::postgres::{create_repositories, migrations};
use ledgerdash::rate_limit::RateLimiter;
use ledgerdash::tenant::{ProvisionTenantAction, ProvisionTenantRequest, TenantDirectory};
use ledgerdash::{DashboardError, SecretString};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "ledgerdash", version, about = "Multi-tenant financial dashboard")]
struct Cli {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Apply public migrations, then tenant DDL to every tenant schema.
    Migrate,
    /// Create a tenant, its schema, domain and first admin.
    ProvisionTenant(ProvisionArgs),
    /// Delete expired sessions, rate-limit windows, devices and reset tokens.
    Prune,
}

#[derive(Args)]
struct DatabaseArgs {
    /// Takes precedence over the individual connection settings.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,
    #[arg(long, env = "DATABASE_HOST", default_value = "localhost", global = true)]
    database_host: String,
    #[arg(long, env = "DATABASE_PORT", default_value_t = 5432, global = true)]
    database_port: u16,
    #[arg(long, env = "DATABASE_NAME", default_value = "ledgerdash", global = true)]
    database_name: String,
    #[arg(long, env = "DATABASE_USER", default_value = "postgres", global = true)]
    database_user: String,
    #[arg(long, env = "DATABASE_PASSWORD", hide_env_values = true, global = true)]
    database_password: Option<String>,
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10, global = true)]
    database_max_connections: u32,
}

impl DatabaseArgs {
    fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.database_url {
            return PgConnectOptions::from_str(url);
        }
        let mut options = PgConnectOptions::new()
            .host(&self.database_host)
            .port(self.database_port)
            .database(&self.database_name)
            .username(&self.database_user);
        if let Some(password) = &self.database_password {
            options = options.password(password);
        }
        Ok(options)
    }

    async fn connect(&self) -> Result<PgPool, DashboardError> {
        let options = self
            .connect_options()
            .map_err(|e| DashboardError::Configuration(format!("database settings: {e}")))?;
        PgPoolOptions::new()
            .max_connections(self.database_max_connections)
            .connect_with(options)
            .await
            .map_err(DashboardError::from)
    }
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind_addr: SocketAddr,
    #[arg(long, env = "SECRET_KEY", hide_env_values = true, default_value = "")]
    secret_key: String,
    /// Relaxes cookie and secret checks for local development.
    #[arg(long, env = "DEBUG")]
    debug: bool,
    #[arg(long, env = "ALLOWED_HOSTS", value_delimiter = ',', default_value = "localhost")]
    allowed_hosts: Vec<String>,
    #[arg(long, env = "CSRF_TRUSTED_ORIGINS", value_delimiter = ',')]
    csrf_trusted_origins: Vec<String>,
    /// Reverse proxies allowed to supply the client address for rate limits.
    #[arg(long, env = "TRUSTED_PROXIES", value_delimiter = ',')]
    trusted_proxies: Vec<IpAddr>,
    #[arg(long, env = "SMTP_HOST", default_value = "localhost")]
    smtp_host: String,
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,
    #[arg(long, env = "SMTP_USER", default_value = "")]
    smtp_user: String,
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true, default_value = "")]
    smtp_password: String,
    #[arg(long, env = "SMTP_USE_TLS", default_value_t = true, action = ArgAction::Set)]
    smtp_use_tls: bool,
    #[arg(long, env = "FROM_EMAIL", default_value = "noreply@localhost")]
    from_email: String,
    #[arg(long, env = "MFA_REMEMBER_DEVICE_DAYS", default_value_t = 7)]
    mfa_remember_device_days: i64,
    /// Session lifetime in seconds.
    #[arg(long, env = "SESSION_COOKIE_AGE", default_value_t = 28_800)]
    session_cookie_age: i64,
}

impl ServeArgs {
    fn dashboard_config(&self) -> DashboardConfig {
        let mut config = if self.debug {
            DashboardConfig::development()
        } else {
            DashboardConfig::default()
        };

        config.security.allowed_hosts = self.allowed_hosts.clone();
        config.security.csrf_trusted_origins = self
            .csrf_trusted_origins
            .iter()
            .filter(|o| !o.trim().is_empty())
            .map(|o| o.trim().to_owned())
            .collect();
        config.security.trusted_proxies = self.trusted_proxies.clone();
        if !self.secret_key.is_empty() {
            config.session.secret_key = SecretString::new(&self.secret_key);
        }
        config.session.session_lifetime = Duration::seconds(self.session_cookie_age);
        config.mfa.remember_device_days = self.mfa_remember_device_days;
        config.smtp = SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_user.clone(),
            password: SecretString::new(&self.smtp_password),
            use_tls: self.smtp_use_tls,
            from_email: self.from_email.clone(),
            ..SmtpConfig::default()
        };
        config
    }
}

#[derive(Args)]
struct ProvisionArgs {
    #[arg(long)]
    name: String,
    /// Also the schema name.
    #[arg(long)]
    slug: String,
    #[arg(long)]
    domain: String,
    #[arg(long)]
    admin_email: String,
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: String,
    #[arg(long, default_value = "")]
    admin_first_name: String,
    #[arg(long, default_value = "")]
    admin_last_name: String,
}

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(&cli.database, args).await,
        Command::Migrate => migrate(&cli.database).await,
        Command::ProvisionTenant(args) => provision_tenant(&cli.database, args).await,
        Command::Prune => prune(&cli.database).await,
    }
}

async fn serve(database: &DatabaseArgs, args: ServeArgs) -> CliResult {
    let config = args.dashboard_config();
    config.validate().map_err(DashboardError::Configuration)?;

    let pool = database.connect().await?;
    let repos = create_repositories(pool);
    let mailer = SmtpMailer::from_config(&config.smtp)?;
    let limiter = RateLimiter::from_config(repos.rate_limits.clone(), &config.rate_limit);

    let state = AppState {
        config: Arc::new(config),
        tenants: repos.tenants.clone(),
        sessions: repos.sessions.clone(),
        users: repos.users.clone(),
        devices: repos.trusted_devices.clone(),
        recovery_codes: repos.recovery_codes.clone(),
        password_resets: repos.password_resets.clone(),
        clients: repos.clients.clone(),
        analytics: repos.analytics.clone(),
        audit: AuditLogger::new(repos.audit_log.clone()),
        limiter: Arc::new(limiter),
        mailer: Arc::new(mailer),
        hasher: Arc::new(Argon2Hasher::production()),
    };

    let app = router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(args.bind_addr).await?;
    log::info!(target: "ledgerdash", "msg=\"listening\", addr=\"{}\"", args.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!(target: "ledgerdash", "msg=\"failed to listen for shutdown\", error=\"{e}\"");
    }
    log::info!(target: "ledgerdash", "msg=\"shutting down\"");
}

async fn migrate(database: &DatabaseArgs) -> CliResult {
    let pool = database.connect().await?;
    migrations::run_public(&pool).await?;

    let repos = create_repositories(pool.clone());
    for tenant in repos.tenants.list_tenants().await? {
        migrations::run_tenant(&pool, &tenant.partition).await?;
    }
    Ok(())
}

async fn provision_tenant(database: &DatabaseArgs, args: ProvisionArgs) -> CliResult {
    let pool = database.connect().await?;
    let repos = create_repositories(pool);

    let action = ProvisionTenantAction::new(
        repos.provisioner.clone(),
        repos.users.clone(),
        Arc::new(Argon2Hasher::production()),
    );
    let provisioned = action
        .execute(ProvisionTenantRequest {
            name: args.name,
            slug: args.slug,
            domain: args.domain,
            admin_email: args.admin_email,
            admin_password: args.admin_password,
            admin_first_name: args.admin_first_name,
            admin_last_name: args.admin_last_name,
        })
        .await?;

    println!(
        "Provisioned tenant '{}' at {} (schema {}); admin {}",
        provisioned.tenant.name,
        provisioned.domain,
        provisioned.tenant.partition,
        provisioned.admin.email
    );
    Ok(())
}

async fn prune(database: &DatabaseArgs) -> CliResult {
    let pool = database.connect().await?;
    let repos = create_repositories(pool);

    let partitions: Vec<_> = repos
        .tenants
        .list_tenants()
        .await?
        .into_iter()
        .map(|t| t.partition)
        .collect();

    let result = PruneExpiredAction::new(
        repos.sessions.clone(),
        repos.rate_limits.clone(),
        repos.trusted_devices.clone(),
        repos.password_resets.clone(),
    )
    .execute(&partitions, Utc::now())
    .await?;

    println!("Pruned {} expired rows", result.total());
    Ok(())
}
