pub mod attendance;
pub mod config;
pub mod db;
pub mod err;
pub mod io;
pub mod models;
pub mod routes;
pub mod state;
pub mod validation;
pub mod verify;

use tokio::signal;

use crate::config::Config;
use crate::db::PgStudents;
use crate::io::ImageStore;
use crate::state::AppState;
use crate::verify::{CommandVerifier, FaceVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::load()?;

    let images_dir = io::prepare_io(&config.images_dir).await?;
    let pg = db::connect(&config.database_url, config.database_max_connections).await?;
    log::info!("Connected to student database");

    let verifier = CommandVerifier::new(&config.face_verify_program, &config.face_model);
    verifier.preload().await?;

    let state = AppState::new(
        PgStudents::new(pg),
        verifier,
        ImageStore::new(images_dir),
    );
    let app = routes::router(state).layer(routes::cors(&config.cors_origins)?);

    log::info!("Starting attendance HTTP server on http://{}", config.bind_address);
    axum::Server::bind(&config.bind_address)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                log::error!("Failed to install terminate handler: {}", err);
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
