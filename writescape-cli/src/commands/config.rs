use std::{fs, path::Path};

use anyhow::{Context, Result};
use shared::config::{ClientConfig, ConfigFormat};

/// Renders the default configuration in `format`, to `output` or stdout.
///
/// # Errors
/// Returns an error if the format is unsupported or the file cannot be written.
pub fn generate_config(format: &str, output: Option<&Path>) -> Result<()> {
    let format: ConfigFormat = format.parse()?;
    let rendered = ClientConfig::with_defaults().render(format)?;

    match output {
        Some(path) => {
            fs::write(path, rendered.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Configuration file '{}' generated successfully.", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
