//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the
//! fridge. In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! ⚠️  The prototype script hardcoded every single parameter — endpoint, keys,
//! bucket, item, sort key — as literals in the script body. Those literals
//! live on here as serde DEFAULTS: run with no config file and no env vars
//! and you get the classic probe, byte for byte of intent. Configure
//! anything and you get a probe that finally moved out of its parents'
//! basement.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::HttpStoreConfig;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// 🎯 Contains everything the probe needs to know about itself,
/// which is more self-awareness than most probes achieve in their lifetime.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🔌 Which store to probe, and how to reach it. Defaults to signed HTTP
    /// against the classic local endpoint.
    #[serde(default)]
    pub store: StoreConfig,
    /// 🎯 What to probe: bucket, item, sort key. Configurable, unlike my children.
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// 🎭 Store selection — externally tagged, so TOML reads like a casting sheet:
///
/// ```toml
/// [store.Http]
/// endpoint = "http://localhost:3812"
/// ```
///
/// or, for the rare soul probing RAM on purpose:
///
/// ```toml
/// store = "InMemory"
/// ```
#[derive(Debug, Deserialize, Clone)]
pub enum StoreConfig {
    /// 📡 The real thing: SigV4-signed HTTP against a live K2V server.
    Http(HttpStoreConfig),
    /// 📦 The stunt double: the in-process store, mostly a creature of tests.
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        // -- 📡 no config? then it's the classic: signed HTTP, local endpoint
        StoreConfig::Http(HttpStoreConfig::default())
    }
}

/// 🎯 The probe target. Three names that address one value in one store:
/// the bucket (namespace), the item (partition key), the sort key.
///
/// Defaults are the original script's immortal trio: `alex`, `root`, `b`.
/// Who is alex? Why root? Why b and not a? History does not record. The
/// defaults do.
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_item")]
    pub item: String,
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
}

fn default_bucket() -> String {
    "alex".to_string()
}
fn default_item() -> String {
    "root".to_string()
}
fn default_sort_key() -> String {
    "b".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            item: default_item(),
            sort_key: default_sort_key(),
        }
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power
/// of defaults.
///
/// 🔧 Merges environment variables (K2VX_*) with an optional TOML file.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file_name` is None  → env vars + defaults. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///   Nobody falls back to an uninvited "config.toml" here. Ancient proverb:
///   "He who defaults to config.toml uninvited, probes the wrong cluster alone."
///
/// 💀 Returns an error if config is unparseable. Check the error message
/// though — it's contextual, informative, and written with love. Or despair.
/// Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    // 🚀 Log what we're loading — because silent failures are the villain
    // origin story of every 3am incident.
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new("<defaults + env only>"))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    // ALL K2VX_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let config = Figment::new().merge(Env::prefixed("K2VX_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // 💬 Build a context message that will actually TELL you what went wrong.
    // None of that "error: error" energy. This isn't a Kafka novel. (The author, not the queue.)
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (K2VX_*). \
             The file exists in our hearts, but apparently its contents and serde disagree.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (K2VX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    // ✅ or 💀, there is no try — actually there is, it's called `?`
    config.extract().context(context_msg)
}
