use log::{error, info, LevelFilter};
use rocket::Error as RocketError;
use thiserror::Error;

/// Errors that are critical to the entire server.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    RocketError(#[from] RocketError),
}

async fn run() -> Result<(), Error> {
    info!("Configuring election server...");
    let rocket = board_elections_backend::build().await.ignite().await?;
    info!("...server configured!");
    // Rocket's own request logging duplicates the logger fairing from here on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    // Set up logging.
    if let Err(e) = log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
    {
        eprintln!("Failed to initialise logging: {e}");
        std::process::exit(1);
    }
    info!("Initialised logging");

    // Launch server.
    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
