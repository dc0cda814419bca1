use fatura_core::{telemetry, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::load(None)?;
    telemetry::init("fatura-server", settings.log_format, &settings.log_level)?;

    fatura_server::serve(settings).await
}
