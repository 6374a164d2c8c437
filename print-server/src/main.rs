use print_server::{Config, Server, ServerState, print_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (dotenv + logging)
    dotenv::dotenv().ok();
    print_server::init_logger_with_file(
        std::env::var("LOG_LEVEL").ok().as_deref(),
        std::env::var("LOG_DIR").ok().as_deref(),
    );

    print_banner();

    tracing::info!("Ember print server starting...");

    // 2. Configuration (strategy resolved once, validated fail-fast)
    let config = Config::from_env();

    // 3. Service wiring
    let state = ServerState::initialize(&config)?;

    // 4. HTTP server + background workers
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
