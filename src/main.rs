use akin_university::application::registrar::Registrar;
use akin_university::config::{Cli, GatewaySettings, Settings, StorageArgs};
use akin_university::domain::ports::{PaymentGatewayRef, RegistryStoreBox};
use akin_university::infrastructure::clock::SystemClock;
use akin_university::infrastructure::gateway::{HttpGateway, StaticGateway};
use akin_university::infrastructure::in_memory::InMemoryRegistryStore;
use akin_university::interfaces::csv::course_reader::import_courses;
use akin_university::interfaces::http::{AppState, router};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Cli::parse().into_settings().into_diagnostic()?;
    settings.logging.init().into_diagnostic()?;

    let store = open_store(&settings.storage).await?;
    let gateway = build_gateway(&settings)?;
    let registrar = Registrar::new(
        store,
        gateway,
        Arc::new(SystemClock),
        settings.policy.clone(),
    );
    if let Some(path) = &settings.storage.courses {
        seed_catalog(&registrar, path).await?;
    }

    let app = router(
        AppState::new(registrar, settings.server.admin_token.clone()),
        Duration::from_secs(settings.server.request_timeout_secs),
    );
    let addr = settings.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;
    info!("server stopped");
    Ok(())
}

#[cfg(feature = "storage-sqlite")]
async fn open_store(storage: &StorageArgs) -> Result<RegistryStoreBox> {
    use akin_university::infrastructure::sqlite::SqliteRegistryStore;

    match &storage.database_url {
        Some(url) => {
            let store = SqliteRegistryStore::connect(url).await.into_diagnostic()?;
            info!("using SQLite storage");
            Ok(Box::new(store))
        }
        None => {
            info!("using in-memory storage");
            Ok(Box::new(InMemoryRegistryStore::new()))
        }
    }
}

#[cfg(not(feature = "storage-sqlite"))]
async fn open_store(storage: &StorageArgs) -> Result<RegistryStoreBox> {
    if storage.database_url.is_some() {
        warn!(
            "persistent storage requested via DATABASE_URL, but the 'storage-sqlite' feature is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Box::new(InMemoryRegistryStore::new()))
}

fn build_gateway(settings: &Settings) -> Result<PaymentGatewayRef> {
    match &settings.gateway {
        GatewaySettings::Http {
            url,
            api_key,
            currency,
        } => {
            let gateway = HttpGateway::new(
                url.clone(),
                api_key.clone(),
                settings.policy.gateway_timeout,
            )
            .into_diagnostic()?
            .with_currency(currency.clone());
            info!(%url, %currency, "charging through the HTTP payment gateway");
            Ok(Arc::new(gateway))
        }
        GatewaySettings::Mock => {
            warn!("mock payment gateway selected: every charge is approved without collecting money");
            Ok(Arc::new(StaticGateway::approving()))
        }
    }
}

/// Seeds the catalog from a CSV file unless courses already exist.
async fn seed_catalog(registrar: &Registrar, path: &Path) -> Result<()> {
    if !registrar.list_courses().await.into_diagnostic()?.is_empty() {
        info!(path = %path.display(), "catalog already populated, skipping import");
        return Ok(());
    }
    let file = File::open(path).into_diagnostic()?;
    let imported = import_courses(registrar, file).await.into_diagnostic()?;
    info!(imported, path = %path.display(), "course catalog imported");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
