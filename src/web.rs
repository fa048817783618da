#![cfg(not(tarpaulin_include))]

use artist_splitter::app;
use artist_splitter::config::Config;

/// Main entry point for the web application
///
/// Reads the configuration from the environment and serves until killed.
/// Logging goes through `env_logger`; set `RUST_LOG=debug` for more detail.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    log::info!(
        "uploads in {}, output in {}, inventory at {}",
        config.upload_dir.display(),
        config.output_dir.display(),
        config.inventory_file.display()
    );

    app::run(config).await
}
