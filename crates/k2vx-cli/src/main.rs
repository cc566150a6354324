//! 🚀 k2vx-cli — the front door, the bouncer, the maitre d' of k2vx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🎛️ The entire CLI surface: one optional config file. The probe's script
/// is fixed; the only thing you get to choose is who it happens to.
#[derive(Debug, Parser)]
#[command(
    name = "k2vx",
    about = "🎯 Replays the eight-step causality-token probe against a K2V store and prints exactly what came back"
)]
struct Cli {
    /// 📋 Path to a TOML config file. Omitted? We peek at ./k2vx.toml, and if
    /// that's not there either, the classic built-in defaults fire.
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args (clap does the catching now — gotta parse 'em all)
/// 3. Load config (the moment of truth)
/// 4. Run the probe (send it and pray 🙏)
/// 5. Handle errors (cry)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts.
    // (The probe's OUTPUT is println! — that's the product. The DIAGNOSTICS
    // are tracing. Different lanes. Stay in yours.)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Resolve the config file before we get too emotionally attached.
    // Explicit path → must exist, no negotiation. No path → we try the
    // conventional ./k2vx.toml, and shrug gracefully if it isn't there.
    let config_file_path_which_is_validated_to_exist = match cli.config {
        Some(path) => {
            let exists = path.try_exists()
                .context(format!("💀 Couldn't even CHECK whether the config file exists. Permissions? A haunted filesystem? Was checking here: '{}'", path.display()))?;
            if !exists {
                anyhow::bail!(
                    "💀 Configuration file not found at '{}'. Double check that it exists, or maybe it's an issue with pwd/cwd and relative paths. In that case, use an absolute path, to be absolutely certain, you are not messing this up.",
                    path.display()
                );
            }
            Some(path)
        }
        None => {
            let conventional = PathBuf::from("k2vx.toml");
            match conventional.try_exists().unwrap_or(false) {
                true => Some(conventional), // ✅ Found it! Better than finding my car keys
                false => None,              // 💤 Not there. Defaults it is. The classic probe rides again.
            }
        }
    };

    // 🔧 Load the config — this is the moment where we find out if the TOML is valid
    // or if someone put a tab where a space should be (looking at you, Kevin)
    let app_config = k2vx::app_config::load_config(config_file_path_which_is_validated_to_exist.as_deref())
        .context("💀 In k2vx-cli, main, we couldn't load the config. Take a look at the file and the K2VX_* environment, make sure it's correct. Make sure you didn't forget something obvious, dumas")?;

    // 🚀 SEND IT. No take-backs. Eight requests are about to happen.
    let result = k2vx::run(app_config).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        // -- like when your wifi icon has full bars but nothing loads
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like the K2V server isn't reachable. \
                Double-check that it's actually running and listening on the \
                configured endpoint (default: http://localhost:3812). If it \
                lives in Docker, try `docker ps` to see what's up, or bring \
                the container back to life. Even servers need a nudge \
                sometimes. ☕"
            );
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    // ✅ If we got here, all eight steps fired and the transcript is on your
    // terminal. Pop the champagne. 🍾 Then go read what the conflict did.
    Ok(())
}
