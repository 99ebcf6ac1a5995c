use std::net::SocketAddr;

use foodgram::{api, config::Config, state::Context};
use sqlx::postgres::PgPoolOptions;
use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;

    log::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    log::info!("Applying migrations...");
    sqlx::migrate!().run(&pool).await?;

    tokio::fs::create_dir_all(&config.media_root).await?;

    let address = SocketAddr::new(config.bind_address, config.port);
    let context = Context::new(pool.clone(), config);

    let (bound, server) =
        warp::serve(api::service(context)).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
    log::info!("Server running on {bound}");

    server.await;

    pool.close().await;
    log::info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
