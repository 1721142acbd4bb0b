pub mod session;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::info;
use uuid::Uuid;

use crate::config::Config;
use session::PlaySocket;

/// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let id = Uuid::new_v4().to_string();
    info!("new play connection: {}", id);
    ws::start(PlaySocket::new(id, config.clone()), &req, stream)
}
