//! Hearth API server binary.
//!
//! Serves the record auth API over an in-memory store seeded with a
//! `users` auth collection and, optionally, one superuser.
//! Prints `{"port": N}` to stdout so a parent process can discover the bound port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hearth_core::App;
use hearth_core::mailer::LogMailer;
use hearth_core::models::{Collection, Record, SUPERUSERS_COLLECTION};
use hearth_core::settings::Settings;
use hearth_core::store::MemoryStore;
use tracing::{debug, info};

/// System job pruning expired rate limit windows.
const RATE_LIMITS_CLEANUP_JOB: &str = "__rateLimitsCleanup";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "hearth_server", about = "Hearth API server")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "HEARTH_PORT", default_value_t = 8090)]
    port: u16,

    /// Public application URL used in email links.
    #[arg(long, env = "HEARTH_APP_URL", default_value = "http://localhost:8090")]
    app_url: String,

    /// Email of a superuser to create at startup.
    #[arg(long, env = "HEARTH_SUPERUSER_EMAIL", requires = "superuser_password")]
    superuser_email: Option<String>,

    /// Password of the startup superuser.
    #[arg(long, env = "HEARTH_SUPERUSER_PASSWORD")]
    superuser_password: Option<String>,

    /// Enable the default rate limit rules.
    #[arg(long, env = "HEARTH_RATE_LIMITS", default_value_t = false)]
    rate_limits: bool,

}

fn seed_store(args: &Args) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    let store = MemoryStore::new();
    let superusers = Collection::new_auth(SUPERUSERS_COLLECTION);
    store.insert_collection(Collection::new_auth("users"));
    store.insert_collection(superusers.clone());

    if let (Some(email), Some(password)) = (&args.superuser_email, &args.superuser_password) {
        let mut superuser = Record::new(&superusers);
        superuser.email = email.clone();
        superuser.verified = true;
        superuser.set_password(password)?;
        store.insert_record(superuser);
        info!(email = %email, "superuser created");
    }
    Ok(store)
}

fn register_system_jobs(app: &App) {
    let handle = app.clone();
    app.cron().add(RATE_LIMITS_CLEANUP_JOB, "* * * * *", move || {
        let app = handle.clone();
        Box::pin(async move {
            let removed = app.rate_limiter().prune_expired();
            debug!(removed, "expired rate limit windows pruned");
        })
    });
}

/// Run the system cleanup job once a minute.
fn spawn_scheduler(app: App) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Some(job) = app.cron().find(RATE_LIMITS_CLEANUP_JOB) {
                job.execute().await;
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Write logs to stderr so stdout is reserved for the JSON port message.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hearth_api=debug,hearth_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    info!(port = args.port, "starting hearth_server");

    let mut settings = Settings::default();
    settings.meta.app_url = args.app_url.clone();
    settings.rate_limits.enabled = args.rate_limits;

    let store = seed_store(&args)?;
    let app = App::new(Arc::new(store), Arc::new(LogMailer), settings);
    register_system_jobs(&app);
    spawn_scheduler(app.clone());

    let config = hearth_api::config::ApiConfig {
        bind_addr: format!("127.0.0.1:{}", args.port),
        ..hearth_api::config::ApiConfig::from_env()
    };
    let router = hearth_api::router(hearth_api::AppState {
        app,
        config: config.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    // Report the bound port as JSON on stdout so a parent process can read it.
    println!("{}", serde_json::json!({ "port": local_addr.port() }));

    info!(addr = %local_addr, "REST API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn superuser_email_requires_password() {
        let err = Args::try_parse_from(["hearth_server", "--superuser-email", "a@example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn lifetime_is_not_tied_to_stdin() {
        let err = Args::try_parse_from(["hearth_server", "--sidecar"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn seeds_optional_superuser() {
        let args = Args::try_parse_from([
            "hearth_server",
            "--superuser-email",
            "root@example.com",
            "--superuser-password",
            "1234567890",
        ])
        .unwrap();
        let store = seed_store(&args).unwrap();
        assert_eq!(store.record_count(), 1);

        let args = Args::try_parse_from(["hearth_server"]).unwrap();
        assert_eq!(seed_store(&args).unwrap().record_count(), 0);
    }
}
