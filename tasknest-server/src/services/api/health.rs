use actix_web::web::*;

use crate::handlers::health;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(resource("/heartbeat").route(get().to(health::heartbeat)));
}
