use gt8004_sdk::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
