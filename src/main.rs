use anyhow::Result;
use glimpse::cli::Cli;
use glimpse::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse_args().into_config();
    config.validate()?;

    println!("🖥  glimpse remote desktop server");
    println!("📡 Listening on: 0.0.0.0:{}", config.port);
    if config.view_password.is_some() {
        println!("👁  View-only access enabled");
    }
    if config.fullscreen {
        println!("🔲 Capturing all displays");
    }
    println!();

    Server::new(config).run().await
}
