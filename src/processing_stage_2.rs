/* Stage 2. Gather size overrides from generated configuration headers (`autoconf.h`). Files are
 * scanned in parallel; the tables are merged in command-line order, so a later file wins when two
 * of them reserve space for the same image.
 */

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use regex::Regex;

/// Image name (lower-case) to reserved size.
pub type SizeOverrides = HashMap<String, u64>;

static RESERVED_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#define CONFIG_PARTITION_MANAGER_RESERVED_SPACE_(\w*) (0x[0-9a-fA-F]+)")
        .expect("reserved space pattern is valid")
});

/// Extracts overrides from one header. A reservation of zero means "not reserved".
pub fn parse_size_overrides(content: &str) -> Result<SizeOverrides> {
    let mut overrides = SizeOverrides::new();

    for captures in content.lines().filter_map(|line| RESERVED_SPACE.captures(line)) {
        let name = captures[1].to_lowercase();
        let value = u64::from_str_radix(&captures[2][2..], 16)
            .with_context(|| format!("Reserved space for `{}` does not fit in 64 bits", name))?;

        if value != 0 {
            overrides.insert(name, value);
        }
    }

    Ok(overrides)
}

pub fn load_size_overrides(configs: &[PathBuf]) -> Result<SizeOverrides> {
    let tables: Vec<SizeOverrides> = configs
        .par_iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read configuration `{}`", path.display()))?;
            parse_size_overrides(&content)
                .with_context(|| format!("In configuration `{}`", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut overrides = SizeOverrides::new();
    for table in tables {
        overrides.extend(table);
    }

    debug!("{} size overrides configured", overrides.len());
    Ok(overrides)
}
