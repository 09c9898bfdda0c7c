use clap::Parser;

use flashalliance::config::{Config, Env, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Env::parse();
    let config = Config::load_file(&env.config)?;
    setup_tracing(&config.log_level());

    flashalliance::launch(config).await
}
