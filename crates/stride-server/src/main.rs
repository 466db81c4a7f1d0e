use stride_server::{start_server, ServerConfig};

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env();
    match start_server(config).await {
        Ok(addr) => {
            tracing::info!("ready on {}", addr);
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        }
        Err(err) => {
            eprintln!("failed to start server: {}", err);
            std::process::exit(1);
        }
    }
}
