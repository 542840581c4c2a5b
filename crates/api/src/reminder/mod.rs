mod compose;
mod process_due_reminders;

pub use process_due_reminders::{DispatchReport, ProcessDueRemindersUseCase};

use crate::error::CapsuleError;
use crate::shared::usecase::execute;
use actix_web::{web, HttpRequest, HttpResponse};
use capsule_keeper_infra::CapsuleContext;
use tracing::warn;

/// Header carrying the shared secret of the external dispatch trigger
pub const DISPATCH_KEY_HEADER: &str = "capsule-dispatch-key";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/reminders/dispatch",
        web::post().to(trigger_dispatch_controller),
    );
}

/// External trigger for one dispatch cycle. Authenticated callers get a `202`
/// right away and the cycle runs in the background, so a slow batch never
/// times out the caller.
async fn trigger_dispatch_controller(
    http_req: HttpRequest,
    ctx: web::Data<CapsuleContext>,
) -> Result<HttpResponse, CapsuleError> {
    let provided = http_req
        .headers()
        .get(DISPATCH_KEY_HEADER)
        .and_then(|h| h.to_str().ok());
    match provided {
        Some(key) if key == ctx.config.dispatch_secret_key => (),
        _ => {
            warn!("Dispatch trigger called without a valid key");
            return Err(CapsuleError::Unauthorized(format!(
                "Missing or invalid {} header",
                DISPATCH_KEY_HEADER
            )));
        }
    }

    let ctx = ctx.get_ref().clone();
    actix_web::rt::spawn(async move {
        let _ = execute(ProcessDueRemindersUseCase, &ctx).await;
    });

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "message": "Dispatch cycle started"
    })))
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::{test, App};

    fn test_ctx() -> CapsuleContext {
        let mut ctx = CapsuleContext::create_inmemory();
        ctx.config.dispatch_secret_key = "valid_key".into();
        ctx
    }

    #[actix_web::test]
    async fn rejects_missing_and_wrong_dispatch_key() {
        let ctx = test_ctx();
        let server = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/reminders/dispatch")
            .to_request();
        let res = test::call_service(&server, req).await;
        assert_eq!(res.status().as_u16(), 401);

        let req = test::TestRequest::post()
            .uri("/reminders/dispatch")
            .insert_header((DISPATCH_KEY_HEADER, "wrong_key"))
            .to_request();
        let res = test::call_service(&server, req).await;
        assert_eq!(res.status().as_u16(), 401);
    }

    #[actix_web::test]
    async fn accepts_valid_dispatch_key_with_202() {
        let ctx = test_ctx();
        let server = test::init_service(
            App::new()
                .app_data(web::Data::new(ctx))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/reminders/dispatch")
            .insert_header((DISPATCH_KEY_HEADER, "valid_key"))
            .to_request();
        let res = test::call_service(&server, req).await;
        assert_eq!(res.status().as_u16(), 202);
    }
}
