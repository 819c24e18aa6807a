use tokio::net::TcpListener;

use guidebook::config::Config;
use guidebook::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guidebook=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    if config.uses_default_secret() {
        tracing::warn!("GUIDEBOOK_JWT_SECRET is not set, using the development secret");
    }

    let state = AppState::from_config(&config);
    let app = guidebook::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app).await.expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mguidebook edge\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mupstream\x1b[0m     {}", config.upstream_url);
    for rule in &config.guard.rules {
        eprintln!(
            "  \x1b[2mguard\x1b[0m        {} \x1b[2m({} → {})\x1b[0m",
            rule.prefix, rule.role, rule.login_path
        );
    }
    eprintln!();
}
