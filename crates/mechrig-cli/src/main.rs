//! MechRig CLI - Command-line interface for mechanical rig synthesis
//!
//! This binary validates rig documents, builds skeletons from their scenes,
//! maintains control widgets and bakes the result for export.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use mechrig_cli::commands;

/// MechRig - Rig synthesis for rigid mechanical hierarchies
#[derive(Parser)]
#[command(name = "mechrig")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report hierarchy issues without modifying the document
    Validate {
        /// Path to the rig document (JSON)
        #[arg(short, long)]
        doc: String,

        /// Root object id (repeatable; default: the document's last selection)
        #[arg(short, long = "root")]
        roots: Vec<String>,

        /// Symmetric origin object id for mirrored groups
        #[arg(long)]
        origin: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Build or rebuild the rig
    Build {
        /// Path to the rig document (JSON)
        #[arg(short, long)]
        doc: String,

        /// Root object id (repeatable; default: the document's last selection)
        #[arg(short, long = "root")]
        roots: Vec<String>,

        /// Symmetric origin object id for mirrored groups
        #[arg(long)]
        origin: Option<String>,

        /// Bone length as a fraction of each group's dominant extent
        #[arg(long)]
        bone_scale: Option<f64>,

        /// Output document path (default: overwrite --doc)
        #[arg(short, long)]
        out: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Create or update control widgets
    Controls {
        /// Path to the rig document (JSON)
        #[arg(short, long)]
        doc: String,

        /// Widget size multiplier
        #[arg(long)]
        global_scale: Option<f64>,

        /// Output document path (default: overwrite --doc)
        #[arg(short, long)]
        out: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Bake the rig into a combined mesh and export skeleton
    Bake {
        /// Path to the rig document (JSON)
        #[arg(short, long)]
        doc: String,

        /// JSON file with an array of actions to bake
        #[arg(short, long)]
        actions: Option<String>,

        /// Export file for the combined mesh, skeleton and baked actions
        #[arg(short, long)]
        out: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            doc,
            roots,
            origin,
            json,
        } => commands::validate::run(&doc, &roots, origin.as_deref(), json),
        Commands::Build {
            doc,
            roots,
            origin,
            bone_scale,
            out,
            json,
        } => commands::build::run(
            &doc,
            &roots,
            origin.as_deref(),
            bone_scale,
            out.as_deref(),
            json,
        ),
        Commands::Controls {
            doc,
            global_scale,
            out,
            json,
        } => commands::controls::run(&doc, global_scale, out.as_deref(), json),
        Commands::Bake {
            doc,
            actions,
            out,
            json,
        } => commands::bake::run(&doc, actions.as_deref(), out.as_deref(), json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
