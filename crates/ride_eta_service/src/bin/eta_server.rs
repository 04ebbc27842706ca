use clap::Parser;
use ride_eta_service::config::ServiceConfig;
use ride_eta_service::logging::init_logging;
use ride_eta_service::{run, ServiceError};

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let config = ServiceConfig::parse();
    init_logging(&config.log_level)?;
    run(config).await
}
