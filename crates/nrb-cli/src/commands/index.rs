//! Index command implementation.
//!
//! Rewrites `<outputDir>/index.html` after a one-shot build: entry assets are
//! injected, `%PUBLIC_URL%` is substituted and, given a metafile, chunks built from
//! the configured `preload` prefixes get `modulepreload` links.

use crate::cli::IndexArgs;
use crate::config::{base_dir_from, CliOverrides, DevConfig, INDEX_FILE_NAME};
use crate::error::{Result, ResultExt};
use crate::index_html::{inject_into_index, preload_chunks, ChunkLayout, Metafile};
use crate::ui;
use std::fs;
use std::path::Path;

/// Execute the index command.
///
/// # Errors
///
/// Returns errors for invalid configuration, a missing output document or an
/// unreadable metafile.
pub async fn execute(args: IndexArgs) -> Result<()> {
    let base_dir = base_dir_from(args.cwd.as_ref())?;
    let config = DevConfig::load(&base_dir, &CliOverrides::from(&args))?;
    config.validate_values()?;

    let metafile = args.metafile.as_ref().map(|path| config.resolve(path));
    let index = config.output_root().join(INDEX_FILE_NAME);

    if rewrite_index(&config, &index, metafile.as_deref())? {
        ui::success(&format!("Updated {}", index.display()));
    } else {
        ui::info(&format!("{} is up to date", index.display()));
    }
    Ok(())
}

/// Rewrite `index` in place. Returns whether the file was written.
pub fn rewrite_index(config: &DevConfig, index: &Path, metafile: Option<&Path>) -> Result<bool> {
    let html = fs::read_to_string(index)
        .with_path(index)
        .with_hint("Run the production build before `nrb index`")?;

    let (mut html, mut changed) = inject_into_index(
        &html,
        &config.entry_file_name,
        &config.assets_dir,
        &config.public_url,
    );

    if let Some(path) = metafile {
        if config.preload.is_empty() {
            tracing::debug!("no preload prefixes configured, metafile ignored");
        } else {
            let metafile = read_metafile(path)?;
            let output_dir = config.output_dir.to_string_lossy();
            let layout = ChunkLayout {
                entry_file_name: &config.entry_file_name,
                assets_dir: &config.assets_dir,
                output_dir: &output_dir,
            };
            let (preloaded, added) = preload_chunks(&html, &metafile, &config.preload, layout);
            html = preloaded;
            changed |= added;
        }
    }

    if changed {
        fs::write(index, html)?;
    }
    Ok(changed)
}

fn read_metafile(path: &Path) -> Result<Metafile> {
    let content = fs::read_to_string(path).with_path(path)?;
    serde_json::from_str(&content).context(format!("Invalid metafile {}", path.display()))
}
