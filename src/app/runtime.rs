//! Interactive search-and-download flow.

use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use libgen_core::{
    AppConfig, BookRecord, CatalogClient, HttpClient, MirrorDownloader, book_filename,
    resolve_default_config_path,
};
use tracing::{debug, info, warn};

use crate::app::progress_manager::ProgressReporter;
use crate::app::{prompt, terminal};
use crate::cli::Args;

pub(crate) async fn run_libgen(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let theme = prompt::build_theme(&config.style);

    let client = HttpClient::with_timeouts(config.http_timeouts())
        .context("failed to build HTTP client")?;
    let catalog = CatalogClient::new(client.clone(), &config.catalog_url)?;
    let downloader = MirrorDownloader::new(client).with_options(config.download_options());

    let query = match args.query {
        Some(query) => query,
        None => prompt::prompt_query(&theme)?,
    };
    if query.trim().is_empty() {
        println!("No search query given.");
        return Ok(());
    }

    let books = catalog
        .search(&query, args.column)
        .await
        .with_context(|| format!("failed to fetch book data for \"{}\"", query.trim()))?;
    if books.is_empty() {
        println!("No books found.");
        return Ok(());
    }

    let Some(index) = prompt::select_book(&theme, &books, &config)? else {
        debug!("selection cancelled");
        return Ok(());
    };
    let book = &books[index];

    let default_dir = args
        .output_dir
        .as_ref()
        .map_or_else(|| config.save_path.clone(), |dir| dir.display().to_string());
    let save_dir = prompt::prompt_save_dir(&theme, &default_dir)?;
    let destination = prepare_destination(&save_dir, book)?;

    let show_bar =
        terminal::should_show_progress(io::stderr().is_terminal(), args.quiet, terminal::is_dumb_terminal());
    let reporter = ProgressReporter::new(show_bar, !args.quiet);

    tokio::select! {
        result = downloader.download(&book.mirrors, &destination, &reporter) => {
            reporter.clear();
            let outcome = result.with_context(|| format!("failed to download \"{}\"", book.title))?;
            info!(mirror = %outcome.mirror, bytes = outcome.bytes, "saved book");
            if !args.quiet {
                println!("Saved to {}", outcome.path.display());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            reporter.clear();
            warn!("download cancelled");
            println!("Download cancelled.");
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => resolve_default_config_path(),
    };
    match path {
        Some(path) => Ok(AppConfig::load_or_init(&path)?),
        None => {
            warn!("no config location available (HOME unset); using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Creates `save_dir` if needed and returns `<save_dir>/<title>_<author>.<ext>`.
pub(crate) fn prepare_destination(save_dir: &Path, book: &BookRecord) -> Result<PathBuf> {
    if !save_dir.exists() {
        fs::create_dir_all(save_dir)
            .with_context(|| format!("failed to create {}", save_dir.display()))?;
        info!(dir = %save_dir.display(), "Created output directory");
    }
    Ok(save_dir.join(book_filename(&book.title, &book.author, &book.extension)))
}
