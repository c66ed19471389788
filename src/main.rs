// Thin entry point, everything lives in the library
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mindmate_lib::run().await
}
