use anyhow::Result;
use novelmill_service::ProjectService;

pub(crate) async fn run(project: Option<&str>) -> Result<()> {
    let embedder = crate::open_embedder()?;
    let service = ProjectService::new(crate::open_store(embedder.dimension()).await?);
    match project {
        Some(id) => {
            let status = service.status(id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        },
        None => {
            let report = service.status_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
    }
    Ok(())
}
