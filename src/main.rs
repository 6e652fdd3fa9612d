#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    workplan_export::run().await?;
    Ok(())
}
