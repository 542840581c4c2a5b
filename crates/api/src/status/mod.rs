use actix_web::{web, HttpResponse};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(status));
}

async fn status() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Alive and well"
    }))
}
