//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `generate` | `Generate`       |
//! | `cache`    | `Cache`          |
//! | `sync`     | `Sync`           |
//! | `config`   | `Config`         |

pub mod cache;
pub mod config;
pub mod generate;
pub mod sync;

pub use cache::cmd_cache;
pub use config::cmd_config;
pub use generate::cmd_generate;
pub use sync::cmd_sync;

use anyhow::Result;
use futurecast::app::{App, AppPaths};

/// Load configuration and start the services for one command.
pub async fn open_app(paths: &AppPaths) -> Result<App> {
    let config = paths.load_config()?;
    App::start(paths.clone(), config).await
}
