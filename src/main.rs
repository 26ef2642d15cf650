#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dealer_market::server::run().await
}
