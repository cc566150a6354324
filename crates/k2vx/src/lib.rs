//! 🚀 k2vx — a causality-token probe for a K2V key-value HTTP API.
//!
//! Eight signed HTTP calls, fixed order, raw output. The library does the
//! probing; the CLI crate does the doors and the lighting.

pub mod app_config;
pub mod backends;
pub(crate) mod common;
pub(crate) mod probe;
pub(crate) mod report;
pub mod sigv4;

use anyhow::{Context, Result};

use crate::app_config::{AppConfig, StoreConfig};
use crate::backends::StoreBackend;
use crate::backends::http_store::HttpStore;
use crate::backends::in_mem_store::InMemoryStore;
use crate::probe::Probe;

/// 🎬 The whole show: cast the backend, run the eight-step script, print the
/// transcript. Errors here are transport or setup sadness — never HTTP
/// status codes, which are content and get printed like everything else.
pub async fn run(app_config: AppConfig) -> Result<()> {
    // 🎭 casting call — config decides who plays the store tonight
    let backend = match &app_config.store {
        StoreConfig::Http(http_config) => StoreBackend::Http(
            HttpStore::new(http_config.clone(), app_config.probe.bucket.clone())
                .context("💀 Could not set up the HTTP store. The probe never even got to fire a request. This is the pre-show falling over.")?,
        ),
        StoreConfig::InMemory => StoreBackend::InMemory(InMemoryStore::new()),
    };

    let report = Probe::new(backend, &app_config.probe)
        .run()
        .await
        .context("💀 The probe sequence stopped partway. Whatever made it stop is right above this line, wearing a full error chain.")?;

    report::render(&report);
    Ok(())
}
