//! Remote reconciliation command: `futurecast sync`.

use anyhow::{Context, Result};

use futurecast::app::{App, AppPaths};
use futurecast::ui::render::merge_summary;

use super::open_app;

pub async fn cmd_sync(paths: &AppPaths, user: &str, remote_url: Option<&str>) -> Result<()> {
    let app = open_app(paths).await?;
    let result = run(&app, user, remote_url).await;
    app.shutdown().await?;
    result
}

async fn run(app: &App, user: &str, remote_url: Option<&str>) -> Result<()> {
    let reconciler = app.reconciler(remote_url)?;
    let report = reconciler
        .sync_with_remote(user)
        .await
        .context("Sync failed; local cache left unchanged")?;
    println!("{}", merge_summary("Synced", &report));
    Ok(())
}
