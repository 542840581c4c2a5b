mod telemetry;

use capsule_keeper_api::Application;
use capsule_keeper_infra::{run_migration, setup_context};
use telemetry::{get_subscriber, init_subscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("capsule_keeper".into(), "info".into());
    init_subscriber(subscriber);

    openssl_probe::init_ssl_cert_env_vars();

    run_migration()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let context = setup_context().await;

    let app = Application::new(context).await?;
    app.start().await
}
