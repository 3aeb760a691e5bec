/// PantryIQ - household pantry API server
use pantryiq::{config::ServerConfig, context::AppContext, error::PantryResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> PantryResult<()> {
    // Configuration picks the log format, so it loads first
    let config = ServerConfig::from_env()?;
    init_logging(&config);

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pantryiq={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____              __             ________
   / __ \____ _____  / /________  __/  _/ __ \
  / /_/ / __ `/ __ \/ __/ ___/ / / // // / / /
 / ____/ /_/ / / / / /_/ /  / /_/ // // /_/ /
/_/    \__,_/_/ /_/\__/_/   \__, /___/\___\_\
                           /____/
        Household pantry server v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
