use anyhow::Context;
use lectern_app::App;
use lectern_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load LECTERN settings")?;
    lectern_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        data_path = ?settings.database.data_path,
        "lectern-app bootstrap starting"
    );

    let app = App::bootstrap(settings).await?;
    tracing::info!("lectern-app bootstrap complete");

    app.serve().await
}
