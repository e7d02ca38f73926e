//! Cache browsing and maintenance commands: `futurecast cache`.

use anyhow::{Context, Result};

use futurecast::app::{App, AppPaths};
use futurecast::timeline::Timeline;
use futurecast::ui::render::{
    merge_summary, statistics_table, terminal_width, timeline_detail, timeline_row,
};

use super::super::{CacheCommands, Cli};
use super::open_app;

pub async fn cmd_cache(cli: &Cli, paths: &AppPaths, command: CacheCommands) -> Result<()> {
    let app = open_app(paths).await?;
    let result = run(cli, &app, command);
    app.shutdown().await?;
    result
}

fn run(cli: &Cli, app: &App, command: CacheCommands) -> Result<()> {
    let cache = &app.cache;

    match command {
        CacheCommands::List { limit } => {
            print_rows(&cache.get_recent_timelines(limit), "No cached timelines");
        }
        CacheCommands::Show { id, json } => {
            let timeline = cache
                .get_timeline(&id)
                .with_context(|| format!("Timeline '{}' not found in cache", id))?;
            if json {
                let body = serde_json::to_string_pretty(&timeline)
                    .context("Failed to serialize timeline")?;
                println!("{}", body);
            } else {
                println!("{}", timeline_detail(&timeline, terminal_width()));
            }
        }
        CacheCommands::Search { query } => {
            print_rows(
                &cache.search_timelines(&query),
                &format!("No timelines match '{}'", query),
            );
        }
        CacheCommands::Style { style } => {
            print_rows(
                &cache.get_timelines_by_style(style),
                &format!("No {} timelines", style),
            );
        }
        CacheCommands::Remove { id } => match cache.remove_timeline(&id) {
            Some(timeline) => println!("Removed '{}' ({})", timeline.title, timeline.id),
            None => anyhow::bail!("Timeline '{}' not found in cache", id),
        },
        CacheCommands::Stats { json } => {
            let stats = cache.get_cache_statistics();
            if json {
                let body = serde_json::to_string_pretty(&stats)
                    .context("Failed to serialize statistics")?;
                println!("{}", body);
            } else {
                print!("{}", statistics_table(&stats));
            }
        }
        CacheCommands::Prune => {
            let removed = cache.clear_expired_cache();
            println!("Removed {} expired timeline(s)", removed);
        }
        CacheCommands::Clear => {
            use dialoguer::Confirm;

            if !cli.yes {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "This will remove all {} cached timeline(s). Are you sure?",
                        cache.len()
                    ))
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirm {
                    println!("Clear cancelled");
                    return Ok(());
                }
            }
            cache.clear_cache();
            println!("Cache cleared");
        }
        CacheCommands::Export { path } => {
            let count = cache
                .export_cache(&path)
                .with_context(|| format!("Failed to export cache to {}", path.display()))?;
            println!("Exported {} timeline(s) to {}", count, path.display());
        }
        CacheCommands::Import { path } => {
            let report = cache
                .import_cache(&path)
                .with_context(|| format!("Failed to import cache from {}", path.display()))?;
            println!("{}", merge_summary("Imported", &report));
        }
    }

    Ok(())
}

fn print_rows(timelines: &[Timeline], empty: &str) {
    if timelines.is_empty() {
        println!("{}", empty);
        return;
    }
    for timeline in timelines {
        println!("{}", timeline_row(timeline));
    }
}
