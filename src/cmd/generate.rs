//! Generation command: `futurecast generate`.

use anyhow::{Context, Result};
use std::sync::Arc;

use futurecast::app::AppPaths;
use futurecast::timeline::TimelineStyle;
use futurecast::ui::GenerationUI;
use futurecast::ui::render::{terminal_width, timeline_detail};

use super::super::Cli;
use super::open_app;

pub async fn cmd_generate(
    cli: &Cli,
    paths: &AppPaths,
    decision: &str,
    style: TimelineStyle,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let app = open_app(paths).await?;

    let ui = Arc::new(if quiet || json {
        GenerationUI::hidden()
    } else {
        GenerationUI::new(cli.verbose)
    });
    ui.start(decision, style);
    let follower = ui.follow(app.controller.subscribe());

    let outcome = tokio::select! {
        result = app.controller.start_generation(decision, style) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    follower.abort();

    let result = match outcome {
        Some(Ok(timeline)) => {
            ui.finish_success(&timeline);
            if json {
                let body = serde_json::to_string_pretty(&timeline)
                    .context("Failed to serialize timeline")?;
                println!("{}", body);
            } else {
                println!();
                println!("{}", timeline_detail(&timeline, terminal_width()));
            }
            Ok(())
        }
        Some(Err(err)) => {
            ui.finish_error(&err.to_string());
            Err(anyhow::Error::new(err))
        }
        None => {
            ui.finish_paused();
            println!("Generation interrupted");
            Ok(())
        }
    };

    app.shutdown().await?;
    result
}
