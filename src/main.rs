#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kennel::start_server().await
}
