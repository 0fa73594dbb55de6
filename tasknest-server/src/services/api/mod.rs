use actix_web::web::*;

mod health;
mod reset;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/api")
            .configure(health::configure)
            .configure(reset::configure),
    );
}
