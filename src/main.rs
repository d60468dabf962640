use std::io;

use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use log::{debug, info};
use trivia::{config::Config, routes, store};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    init_logger(&config)?;

    let pool = store::init(&config.database_url, config.pool_size, config.seed)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let pool = Data::new(pool);
    let static_dir = config.static_dir.clone();

    info!("Listening on {}", config.bind);
    HttpServer::new(move || {
        let app = App::new()
            .app_data(pool.clone())
            .wrap(routes::cors())
            .wrap(Logger::default())
            .configure(routes::configure);
        match &static_dir {
            Some(dir) => app.service(routes::frontend(dir)),
            None => app,
        }
    })
    .bind(&config.bind)?
    .run()
    .await
}

// Set up logging //
////////////////////

fn init_logger(config: &Config) -> io::Result<()> {
    use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode};

    CombinedLogger::init(vec![TermLogger::new(
        config.log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    debug!("Logger successfully initialized");
    Ok(())
}
