mod archive_capsule;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/capsules",
        web::post().to(archive_capsule::archive_capsule_controller),
    );
}
