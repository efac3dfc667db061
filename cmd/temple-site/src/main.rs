//! # temple-site
//!
//! Assembles the service from configuration. Which backends can be chosen
//! at runtime depends on the features the binary was compiled with.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use api_adapters::{middleware::standard_layers, router, AppState};
use auth_adapters::StaticTokenResolver;
use configs::{AppConfig, AuthConfig, DataBackend, DataConfig, LogConfig, MediaBackend, StorageConfig};
use domains::{Allowlist, DataClient, ObjectStorage, SessionResolver, SystemClock};
use services::Backends;
use storage_adapters::memory::{MemoryDataClient, MemoryObjectStore};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(any(feature = "db-rest", feature = "media-rest"))]
use secrecy::ExposeSecret;

fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

#[cfg(any(feature = "db-rest", feature = "media-rest"))]
fn api_key(data: &DataConfig) -> anyhow::Result<&str> {
    data.api_key
        .as_ref()
        .map(|k| k.expose_secret())
        .context("data.api_key is required for the hosted services")
}

async fn data_client(config: &DataConfig) -> anyhow::Result<Arc<dyn DataClient>> {
    let client: Arc<dyn DataClient> = match config.backend {
        DataBackend::Memory => {
            warn!("using in-memory data: content is lost on restart");
            Arc::new(MemoryDataClient::new())
        }
        #[cfg(feature = "db-sqlite")]
        DataBackend::Sqlite => Arc::new(storage_adapters::sqlite::SqliteDataClient::new(&config.url).await?),
        #[cfg(feature = "db-rest")]
        DataBackend::Rest => Arc::new(storage_adapters::rest::RestDataClient::new(
            &config.url,
            api_key(config)?,
            config.timeout,
        )?),
        #[allow(unreachable_patterns)]
        other => bail!("data backend {other:?} is not compiled into this binary"),
    };
    Ok(client)
}

/// Object storage plus, for the local store, the directory to serve under
/// the public prefix.
struct Media {
    storage: Arc<dyn ObjectStorage>,
    serve: Option<(String, PathBuf)>,
}

#[cfg_attr(not(feature = "media-rest"), allow(unused_variables))]
fn media(config: &StorageConfig, data: &DataConfig) -> anyhow::Result<Media> {
    let media = match config.backend {
        MediaBackend::Memory => {
            warn!("using in-memory media: uploads are lost on restart");
            Media {
                storage: Arc::new(MemoryObjectStore::new(config.public_url.as_str())),
                serve: None,
            }
        }
        #[cfg(feature = "media-local")]
        MediaBackend::Local => {
            let store = storage_adapters::local_media::LocalMediaStore::new(&config.root, config.public_url.as_str())?;
            let serve = config
                .public_url
                .starts_with('/')
                .then(|| (config.public_url.trim_end_matches('/').to_string(), store.root().to_path_buf()));
            Media {
                storage: Arc::new(store),
                serve,
            }
        }
        #[cfg(feature = "media-rest")]
        MediaBackend::Rest => Media {
            storage: Arc::new(storage_adapters::rest::RestObjectStorage::new(
                &data.url,
                api_key(data)?,
                data.timeout,
            )?),
            serve: None,
        },
        #[allow(unreachable_patterns)]
        other => bail!("media backend {other:?} is not compiled into this binary"),
    };
    Ok(media)
}

#[cfg(feature = "auth-jwt")]
fn jwt_resolver(config: &AuthConfig) -> Option<Arc<dyn SessionResolver>> {
    use secrecy::ExposeSecret as _;

    let secret = config.jwt_secret.as_ref()?;
    Some(Arc::new(auth_adapters::JwtSessionResolver::new(
        secret.expose_secret().as_bytes(),
        config.jwt_audience.as_deref(),
    )))
}

#[cfg(not(feature = "auth-jwt"))]
fn jwt_resolver(_: &AuthConfig) -> Option<Arc<dyn SessionResolver>> {
    None
}

fn session_resolver(config: &AuthConfig) -> Arc<dyn SessionResolver> {
    jwt_resolver(config).unwrap_or_else(|| {
        warn!("no token verifier configured: every bearer token will be refused");
        Arc::new(StaticTokenResolver::new())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "could not listen for Ctrl+C"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);
    info!(
        data = ?config.data.backend,
        media = ?config.storage.backend,
        admins = config.auth.admin_allowlist.len(),
        "starting temple site"
    );

    let client = data_client(&config.data).await?;
    let Media { storage, serve } = media(&config.storage, &config.data)?;
    let backends = Backends {
        client,
        storage,
        bucket: config.storage.bucket.clone(),
        clock: Arc::new(SystemClock),
    };
    let allowlist = Allowlist::new(config.auth.admin_allowlist.iter().cloned());
    let state = AppState::new(backends, session_resolver(&config.auth), allowlist);

    let mut app = router(state);
    if let Some((prefix, root)) = serve {
        info!(prefix = %prefix, root = %root.display(), "serving local media");
        app = app.nest_service(&prefix, ServeDir::new(root));
    }
    let app = standard_layers(app);

    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!(address = %config.server.bind, "temple site listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}
