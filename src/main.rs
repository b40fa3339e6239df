use std::{process, sync::Arc, time::Duration};

use quire::{
    application::{
        content::{ContentRepository, ContentSource, ContentStore},
        error::AppError,
        presence::{InMemoryBroadcaster, PresenceTracker},
    },
    config,
    domain::posts::ContentKind,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        source::FsContentSource,
        telemetry,
    },
};
use tokio::{sync::watch, task::JoinHandle, try_join};
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Check(_) => run_check(settings).await,
    }
}

async fn open_store(settings: &config::Settings) -> Result<Arc<ContentStore>, AppError> {
    let source: Arc<dyn ContentSource> =
        Arc::new(FsContentSource::new(settings.content.root.clone()));
    let options = settings.content.parse.clone();

    let store = tokio::task::spawn_blocking(move || ContentStore::open(source, options))
        .await
        .map_err(|err| AppError::unexpected(format!("content load task failed: {err}")))??;
    Ok(Arc::new(store))
}

async fn run_check(settings: config::Settings) -> Result<(), AppError> {
    let store = open_store(&settings).await?;
    let snapshot = store.snapshot();

    for kind in ContentKind::ALL {
        let collection = snapshot.collection(kind);
        info!(
            target = "quire::check",
            kind = %kind,
            total = collection.len(),
            published = collection.published().len(),
            tags = collection.tag_counts().len(),
            "Content check passed"
        );
    }

    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = open_store(&settings).await?;
    let broadcaster = Arc::new(InMemoryBroadcaster::new(
        settings.presence.channel_capacity.get(),
    ));
    let presence = PresenceTracker::new(broadcaster);

    let sweeper_handle = spawn_presence_sweeper(presence.clone(), &settings.presence);
    let reload_handle = settings
        .content
        .reload_interval
        .map(|every| spawn_content_reloader(Arc::clone(&store), every));

    let state = HttpState {
        content: ContentRepository::new(store),
        presence,
        site: Arc::new(settings.site.clone()),
        heartbeat: settings.presence.heartbeat,
    };

    let result = serve_http(&settings, state).await;

    sweeper_handle.abort();
    let _ = sweeper_handle.await;

    if let Some(handle) = reload_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

fn spawn_presence_sweeper(
    tracker: PresenceTracker,
    settings: &config::PresenceSettings,
) -> JoinHandle<()> {
    let every = settings.sweep_interval;
    let ttl = settings.member_ttl;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            tracker.sweep(ttl);
            let pruned = tracker.broadcaster().prune();
            if pruned > 0 {
                debug!(pruned, "Pruned idle presence channels");
            }
        }
    })
}

fn spawn_content_reloader(store: Arc<ContentStore>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Periodic content reload enabled");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let store = Arc::clone(&store);
            // Failures are logged by the store and the old snapshot stays live.
            if let Err(err) = tokio::task::spawn_blocking(move || store.reload()).await {
                error!(error = %err, "content reload task panicked");
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let public_router = http::build_router(state.clone());
    let admin_router = http::build_admin_router(state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async move { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            return result
                .map(|_| ())
                .map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received; draining connections");
        }
    }

    let _ = shutdown_tx.send(true);

    // Presence streams stay open until their clients leave, so draining is bounded.
    match tokio::time::timeout(settings.server.graceful_shutdown, &mut servers).await {
        Ok(result) => result
            .map(|_| ())
            .map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
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
