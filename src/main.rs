use feed_relay::api::{AppState, build_app};
use feed_relay::config::AppConfig;
use feed_relay::llm::create_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export GROUPME_ACCESS_TOKEN=...");
        std::process::exit(1);
    });

    let llm = match config.llm.as_ref() {
        Some(llm_config) => Some(create_provider(llm_config)?),
        None => {
            tracing::warn!("No LLM API key set; email relevance filter disabled");
            None
        }
    };

    eprintln!("📬 Feed Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Model: {}",
        config
            .llm
            .as_ref()
            .map(|c| c.model.as_str())
            .unwrap_or("none (filter disabled)")
    );
    eprintln!(
        "   Mail: unread_only={}, relevance_filter={}",
        config.mail.unread_only, config.mail.relevance_filter
    );
    eprintln!("   GroupMe: track_unread={}", config.track_unread);
    eprintln!("   CORS: {}", config.cors_origins.join(", "));
    eprintln!("   API: http://0.0.0.0:{}\n", config.port);

    let state = AppState::from_config(&config, llm)?;
    let app = build_app(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Feed Relay API started");
    axum::serve(listener, app).await?;

    Ok(())
}
