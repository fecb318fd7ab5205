//! rlogic command line tools.
//!
//! Provides the `rlogic` binary for looking into saved logic engine files
//! without a host application: `info` prints versions, metadata and an object
//! summary, `feature-level` prints only the feature level the file was saved
//! with.
//!
//! Log output of the storage layer (versions, asset metadata) goes to stdout
//! at info level.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use rlogic_storage::{FileSummary, StorageError};

/// Logic engine file tools.
#[derive(Parser)]
#[command(name = "rlogic", about = "Logic engine file tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Summarize a saved file.
    Info {
        /// Path to the saved file.
        file: PathBuf,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the feature level a file was saved with.
    FeatureLevel {
        /// Path to the saved file.
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Info { file, json } => run_info(&file, json),
        Commands::FeatureLevel { file } => run_feature_level(&file),
    };
    process::exit(exit_code);
}

/// Execute the info subcommand.
///
/// Returns exit code: 0 = success, 1 = unreadable content, 3 = I/O error.
fn run_info(path: &Path, json: bool) -> i32 {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", path.display(), e);
            return 3;
        }
    };

    let summary = match rlogic_storage::inspect(&bytes, &format!("file '{}'", path.display())) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if json {
        let out = serde_json::to_string_pretty(&summary)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize summary: {}\"}}", e));
        println!("{}", out);
    } else {
        print!("{}", render(&summary));
    }
    0
}

fn run_feature_level(path: &Path) -> i32 {
    match rlogic_storage::feature_level_from_file(path) {
        Ok(level) => {
            println!("{}", level);
            0
        }
        Err(e @ StorageError::Io { .. }) => {
            eprintln!("Error: {}", e);
            3
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Human-readable form of a summary.
fn render(summary: &FileSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("size:           {} bytes\n", summary.size));
    out.push_str(&format!("feature level:  {:02}\n", summary.feature_level));
    out.push_str(&format!("host version:   {}\n", summary.host_version));
    out.push_str(&format!("logic version:  {}\n", summary.logic_version));
    if let Some(meta) = &summary.asset_metadata {
        out.push_str(&format!("metadata:       {}\n", meta.metadata));
        if let Some(v) = &meta.exporter_version {
            out.push_str(&format!(
                "exporter:       {} (file format version {})\n",
                v.string, meta.exporter_file_version
            ));
        }
    }
    out.push_str(&format!("modules:        {}\n", summary.modules));
    out.push_str(&format!("data arrays:    {}\n", summary.data_arrays));
    out.push_str(&format!("nodes:          {}\n", summary.node_count()));
    for (kind, count) in &summary.nodes {
        out.push_str(&format!("  {:<22}{}\n", kind, count));
    }
    out.push_str(&format!(
        "links:          {} ({} weak)\n",
        summary.links, summary.weak_links
    ));
    out.push_str(&format!("content hash:   {}\n", summary.content_hash));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_lists_node_kinds() {
        let summary = FileSummary {
            size: 120,
            host_version: "28.0.0".into(),
            logic_version: "0.1.0".into(),
            feature_level: 2,
            asset_metadata: None,
            modules: 0,
            data_arrays: 1,
            nodes: BTreeMap::from([("script".to_owned(), 2), ("timer node".to_owned(), 1)]),
            links: 1,
            weak_links: 0,
            content_hash: "ab".repeat(32),
        };
        let text = render(&summary);
        assert!(text.contains("feature level:  02\n"));
        assert!(text.contains("nodes:          3\n"));
        assert!(text.contains("  script                2\n"));
        assert!(text.contains("links:          1 (0 weak)\n"));
    }
}
