use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let addr = format!("127.0.0.1:{port}");
    let state = mock_server::SharedState::default();

    if let Ok(path) = std::env::var("MOCK_MAPPINGS") {
        let json = std::fs::read_to_string(&path)?;
        let stubs = mock_server::load_mappings(&state, &json)?;
        info!("loaded {} stubs from {path}", stubs.len());
    }

    let listener = TcpListener::bind(&addr).await?;
    mock_server::run(listener, state).await?;
    Ok(())
}
