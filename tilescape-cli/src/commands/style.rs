//! Style command - inspect a parsed style document.

use std::path::PathBuf;

use clap::Args;

use tilescape::style::{KeepAllFilters, LayerVisibility};
use tilescape::StyleDocument;

use crate::error::CliError;

/// Arguments for the style command.
#[derive(Args)]
pub struct StyleArgs {
    /// Path to the style JSON document.
    pub path: PathBuf,
}

/// Run the style command.
pub fn run(args: StyleArgs) -> Result<(), CliError> {
    let json = std::fs::read_to_string(&args.path)?;
    let style = StyleDocument::from_json(&json, &KeepAllFilters)?;

    println!("sources:");
    for id in style.referenced_sources() {
        if let Some(source) = style.source(id) {
            match source.maxzoom {
                Some(maxzoom) => println!("  {} ({}, maxzoom {})", id, source.kind, maxzoom),
                None => println!("  {} ({})", id, source.kind),
            }
        }
    }

    println!("layers:");
    for layer in style.layers() {
        let source = layer.source.as_deref().unwrap_or("-");
        let hidden = if layer.visibility == LayerVisibility::None {
            " [hidden]"
        } else {
            ""
        };
        println!("  {} ({}, source {}){}", layer.id, layer.kind, source, hidden);
    }

    println!("maximum level: {}", style.maximum_level());
    Ok(())
}
