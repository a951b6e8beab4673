#[tokio::main]
async fn main() {
    groupbuy_observability::init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
        tracing::info!("BIND_ADDR not set; defaulting to 0.0.0.0:8080");
        "0.0.0.0:8080".to_string()
    });

    let app = groupbuy_api::app::build_app();

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {addr}");
    }

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited");
        std::process::exit(1);
    }
}
