/* Stage 5. Write an override header with the base address of every image that has an output. */

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use crate::processing_stage_1::ImageRegistry;

pub const BASE_ADDRESS_MACRO: &str = "CONFIG_FLASH_BASE_ADDRESS";

pub fn render_override(address: u64) -> String {
    format!(
        "#undef {macro_name}\n#define {macro_name} {address:#x}\n",
        macro_name = BASE_ADDRESS_MACRO,
        address = address
    )
}

/// Writes the headers and returns the paths written, in registry order.
pub fn write_overrides(registry: &ImageRegistry) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for image in registry.images() {
        let out_path = match &image.out_path {
            Some(out_path) => out_path,
            None => {
                debug!("image `{}` has no output", image.name);
                continue;
            }
        };

        let address = image
            .address
            .ok_or_else(|| anyhow!("Image `{}` has no address assigned", image.name))?;

        write_override(out_path, address)
            .with_context(|| format!("Cannot write override for image `{}`", image.name))?;

        info!("{:#x} -> {}", address, out_path.display());
        written.push(out_path.clone());
    }

    Ok(written)
}

fn write_override(out_path: &Path, address: u64) -> Result<()> {
    std::fs::write(out_path, render_override(address))
        .with_context(|| format!("Cannot write `{}`", out_path.display()))
}
