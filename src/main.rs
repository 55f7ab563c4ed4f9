use std::{future::IntoFuture, process, sync::Arc};

use microblog::{
    application::{
        auth::Credentials,
        error::AppError,
        jobs::{JobTrigger, spawn_post_refresh, spawn_session_sweep},
        posts::PostService,
        render::ComrakRenderer,
        repos::{PostsRepo, RepoError},
        sessions::SessionStore,
    },
    cache::PostCache,
    config,
    domain::posts::MarkdownRenderer,
    infra::{
        error::InfraError,
        http::{self, HttpState, SiteSettings},
        posts::FsPostStore,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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

fn open_store(
    settings: &config::Settings,
    renderer: Arc<dyn MarkdownRenderer>,
) -> Result<Arc<FsPostStore>, AppError> {
    let store = FsPostStore::new(settings.blog.posts_directory.clone(), renderer)
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(Arc::new(store))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let renderer: Arc<dyn MarkdownRenderer> = Arc::new(ComrakRenderer::new());
    let store: Arc<dyn PostsRepo> = open_store(&settings, renderer.clone())?;

    let credentials = match (&settings.blog.password, settings.blog.view_only) {
        (Some(password), false) => Some(Arc::new(Credentials::from_password(
            password,
            &settings.blog.title,
        )?)),
        _ => None,
    };

    let cache = Arc::new(PostCache::new(store));
    let index = cache.refresh().await?;
    info!(
        target = "microblog::serve",
        posts = index.len(),
        directory = %settings.blog.posts_directory.display(),
        "post index loaded"
    );

    let sessions = Arc::new(SessionStore::new());

    let refresh_job = spawn_post_refresh(cache.clone(), settings.refresh.posts_interval);
    let sweep_job = spawn_session_sweep(
        sessions.clone(),
        settings.sessions.sweep_interval,
        settings.sessions.ttl,
    );

    let state = HttpState {
        posts: Arc::new(PostService::new(cache)),
        sessions,
        credentials,
        renderer,
        site: Arc::new(SiteSettings {
            title: settings.blog.title.clone(),
            view_only: settings.blog.view_only,
            secure_cookie: settings.sessions.secure_cookie,
        }),
    };

    let reload = tokio::spawn(forward_reload_signals(refresh_job.trigger_handle()));
    let result = serve_http(&settings, state).await;

    reload.abort();
    refresh_job.shutdown().await;
    sweep_job.shutdown().await;

    result
}

#[cfg(unix)]
async fn forward_reload_signals(job: JobTrigger) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(target = "microblog::serve", error = %err, "SIGHUP reload unavailable");
            return;
        }
    };
    while hangups.recv().await.is_some() {
        info!(target = "microblog::serve", "SIGHUP received; refreshing post index");
        job.fire();
    }
}

#[cfg(not(unix))]
async fn forward_reload_signals(_job: JobTrigger) {}

async fn run_check(settings: config::Settings) -> Result<(), AppError> {
    let store = open_store(&settings, Arc::new(ComrakRenderer::new()))?;

    let names = store.list_filenames().await?;
    let mut malformed = 0usize;
    for name in &names {
        match store.read_post(name).await {
            Ok(_) => {}
            Err(err @ RepoError::Malformed { .. }) => {
                malformed += 1;
                warn!(target = "microblog::check", file = %name, error = %err, "malformed post");
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(
        target = "microblog::check",
        posts = names.len(),
        malformed,
        "post check finished"
    );

    if malformed > 0 {
        return Err(AppError::unexpected(format!(
            "{malformed} of {} posts are malformed",
            names.len()
        )));
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "microblog::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!(target = "microblog::serve", "shutdown requested");
            signal.notify_one();
        },
    );

    let grace = settings.server.graceful_shutdown;
    let deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "microblog::serve",
                seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}
