mod api;
mod channel;
mod host;
mod surface;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
