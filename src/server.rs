//! Listener lifecycle: router construction, startup banner and
//! signal-driven graceful shutdown.

use axum::{routing::any, Router};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::errors::SetupError;
use crate::handlers::{self, AppContext};

/// Build the application router. The dispatcher is the sole handler for
/// every path; the method is deliberately not distinguished.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", any(handlers::handle_root))
        .route("/*path", any(handlers::handle_request))
        .with_state(ctx)
}

/// Bind the listener and serve until SIGINT/SIGTERM. In-flight requests
/// are drained before the future resolves.
pub async fn serve(config: ServerConfig) -> Result<(), SetupError> {
    let addr = config.listen_addr.clone();
    let quiet = config.quiet;
    let banner = banner_url(&config);

    let ctx = AppContext::new(config);
    let app = router(ctx);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SetupError::Bind(addr.clone(), e))?;

    if !quiet {
        println!("Serving on {}", banner);
    }
    log::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(SetupError::Io)?;

    log::info!("server exited");
    Ok(())
}

/// The startup banner points directly at index.md when the served
/// directory has a readable one.
fn banner_url(config: &ServerConfig) -> String {
    let index = config.base_dir.join("index.md");
    if index.is_file() && std::fs::File::open(&index).is_ok() {
        format!("http://{}/index.md", config.listen_addr)
    } else {
        format!("http://{}", config.listen_addr)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
