mod app;
mod http;
mod restart;
mod sensor;
mod store;
mod telemetry;
mod update;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
