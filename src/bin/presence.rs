use clap::Parser;

use guidebook::config::Config;
use guidebook::middleware::auth::TokenVerifier;
use guidebook::models::identity::{Identity, Role};
use guidebook::realtime::WsConnector;
use guidebook::session::Session;

/// Open a realtime session for one identity and print who is online.
#[derive(Parser, Debug)]
#[command(name = "guidebook-presence", version)]
struct Cli {
    /// Signed identity token. Verified with GUIDEBOOK_JWT_SECRET.
    #[arg(long, conflicts_with_all = ["user_id", "role"])]
    token: Option<String>,

    #[arg(long, requires = "role")]
    user_id: Option<String>,

    #[arg(long, requires = "user_id")]
    role: Option<Role>,

    /// Realtime endpoint, overrides GUIDEBOOK_REALTIME_URL.
    #[arg(long)]
    url: Option<String>,
}

impl Cli {
    fn identity(&self, config: &Config) -> Result<Identity, String> {
        if let Some(ref token) = self.token {
            return TokenVerifier::new(&config.jwt_secret)
                .verify(token)
                .ok_or_else(|| "identity token is invalid or expired".to_string());
        }
        match (&self.user_id, self.role) {
            (Some(id), Some(role)) => Ok(Identity::new(id.clone(), role)),
            _ => Err("pass --token, or --user-id together with --role".to_string()),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guidebook=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(ref url) = cli.url {
        config.realtime.endpoint = url.clone();
    }

    let identity = match cli.identity(&config) {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let session = Session::start(&config.realtime, WsConnector::from_settings(&config.realtime));
    let mut realtime = session.realtime();
    session.sign_in(identity.clone());
    eprintln!("watching presence as {identity} via {}", config.realtime.endpoint);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            peers = realtime.peers_changed() => match peers {
                Ok(peers) if peers.is_empty() => println!("online: (nobody)"),
                Ok(peers) => println!("online: {}", peers.join(", ")),
                Err(_) => break,
            },
        }
    }

    session.sign_out();
    session.close().await;
}
