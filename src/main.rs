use actix_web::{web, App, HttpServer};
use log::info;

mod config;
mod engine;
mod game;
mod models;
mod routes;
mod websocket;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env();
    info!("starting play server at http://{}", config.bind_addr);
    info!("engine binary: {}", config.engine_path);

    let bind_addr = config.bind_addr.clone();
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .configure(routes::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
