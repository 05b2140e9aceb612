#[tokio::main]
async fn main() -> anyhow::Result<()> {
    misura_lib::run().await
}
