use actix_web::error::InternalError;
use actix_web::web::*;
use actix_web::HttpResponse;

use tasknest_common::messages::AckResponse;

use crate::handlers::reset;

// A body that cannot be parsed at all gets the same "required" failure as an
// empty one, still inside the 200 envelope.
fn json_error_config(message: &'static str) -> JsonConfig {
    JsonConfig::default().error_handler(move |err, _req| {
        InternalError::from_response(err, HttpResponse::Ok().json(AckResponse::error(message)))
            .into()
    })
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/auth")
            .service(
                resource("/issue-reset-code")
                    .app_data(json_error_config("email required"))
                    .route(post().to(reset::issue_reset_code)),
            )
            .service(
                resource("/confirm-reset-code")
                    .app_data(json_error_config("email, code, and newPassword are required"))
                    .route(post().to(reset::confirm_reset_code)),
            ),
    );
}
