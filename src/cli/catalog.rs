use anyhow::{Context, Result};
use msqc::catalog::{Chromatography, ReferenceCatalog};
use serde_json::Value;

/// Print the catalog as flat `key = value` lines
pub fn run(catalog: &ReferenceCatalog, chromatography: Option<Chromatography>, json: bool) -> Result<()> {
    let map = catalog.to_scalar_map(chromatography);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&map).context("Failed to serialize catalog")?
        );
        return Ok(());
    }

    for (key, value) in &map {
        match value {
            Value::String(s) => println!("{} = {}", key, s),
            other => println!("{} = {}", key, other),
        }
    }
    Ok(())
}
