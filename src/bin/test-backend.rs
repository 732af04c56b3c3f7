//! Minimal backend for trying the proxy by hand.
//!
//! Answers every request with `"<host>:<port> - <message>"`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap, Method, Uri},
    routing::any,
    Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "test-backend")]
#[command(about = "Echo backend for the dispatch proxy", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Message to return
    #[arg(short, long, default_value = "Hello from backend")]
    message: String,
}

#[derive(Clone)]
struct Identity {
    port: u16,
    message: Arc<str>,
}

async fn answer(State(identity): State<Identity>, method: Method, uri: Uri, headers: HeaderMap) -> String {
    tracing::info!(method = %method, path = %uri.path(), "Received request");

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    format!("{}:{} - {}\n", host, identity.port, identity.message)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "test_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let identity = Identity {
        port: cli.port,
        message: cli.message.into(),
    };

    let app = Router::new()
        .route("/", any(answer))
        .route("/{*path}", any(answer))
        .with_state(identity);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Starting server");

    axum::serve(listener, app).await?;
    Ok(())
}
