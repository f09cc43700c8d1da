use anyhow::Result;

use neutron_client::commands;
use neutron_client::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;

    init_logging(&config);

    config.validate()?;
    tracing::debug!(
        strategy = ?config.auth_strategy,
        auth_url = ?config.auth_url,
        endpoint_type = %config.endpoint_type,
        "Configuration loaded"
    );

    let (client, mut session) = config.build_client()?;

    let output = commands::run(&command, &client, &mut session).await?;
    println!("{}", output);

    tracing::debug!(state = ?session.state(), "Command finished");
    Ok(())
}

/// Logs go to stderr so command output stays clean on stdout
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    if config.log_json {
        builder.json().init();
    } else {
        builder.with_file(true).with_line_number(true).init();
    }
}
