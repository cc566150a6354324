//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 One trait, three operations, two stores. The probe upstairs reads a
//! script; the backend down here actually talks to something. Which
//! something? The probe neither knows nor cares. That's the whole trick.
//!
//! 🎭 This module is the casting agency. Need to hit a live K2V server with
//! signed requests? We have a backend for that. Need a store that lives in a
//! BTreeMap and answers instantly so the tests don't need a network? We have
//! a backend for that too. We have exactly two backends. We are a boutique.
//!
//! ⚠️ The singularity will arrive before we add a third store variant.
//! At that point, the AGI will just implement `KvStore` for itself and cut
//! us out entirely.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not
//! question the duck.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{CausalityToken, ProbeResponse};

pub(crate) mod http_store;
pub(crate) mod in_mem_store;

// 🎯 Re-export the backend config so callers can do `backends::HttpStoreConfig`
// instead of spelunking into `backends::http_store::HttpStoreConfig`.
// Convenience is a feature. So is not typing "http_store::" fourteen times per file.
pub use http_store::HttpStoreConfig;

/// 🚰 A K2V store, as seen from the probe's side of the counter.
///
/// Three operations, matching the three things the script ever does:
/// list the index, read an item, write an item. Implement this trait and
/// you too can have a fixed sequence of conditional writes replayed at you.
///
/// # Contract
/// - Every operation returns `Ok(ProbeResponse)` for anything the store
///   actually said — including 404s, 409s, and 500s. An HTTP "failure" is
///   DATA here, not an error. The probe prints, it does not judge.
/// - `Err(...)` is reserved for transport-level sadness: refused
///   connections, DNS tantrums, timeouts. Things where there is no response
///   to print.
/// - The borrow checker demands `&mut self` because stores have state. And
///   feelings. Mostly state.
#[async_trait]
pub(crate) trait KvStore: std::fmt::Debug {
    /// 📇 `GET /{bucket}` — list the partition keys and their counts.
    async fn read_index(&mut self) -> Result<ProbeResponse>;

    /// 📖 `GET /{bucket}/{item}?sort_key={k}` — fetch the current value(s).
    /// Single value comes back raw; concurrent values come back as a JSON
    /// array of base64 strings. The causality token rides in a header.
    async fn read_item(&mut self, item: &str, sort_key: &str) -> Result<ProbeResponse>;

    /// ✍️ `PUT /{bucket}/{item}?sort_key={k}` — write a value. With a token:
    /// "this write supersedes what that token saw". Without: "this write
    /// has no causal opinion and will coexist with whatever's there".
    async fn insert_item(
        &mut self,
        item: &str,
        sort_key: &str,
        value: Vec<u8>,
        causality: Option<&CausalityToken>,
    ) -> Result<ProbeResponse>;
}

/// 🎭 The many faces of a store — a polymorphic casting call for K2V targets.
///
/// Each variant wraps a concrete store. The enum dispatches via
/// `impl KvStore for StoreBackend`, so the probe never needs to know (or
/// care) whether it's probing a live server over signed HTTP or a BTreeMap
/// doing its best impression of one.
///
/// Think of it as a universal remote. Except it only controls key-value
/// stores. And it's async. And there is no warranty. Ancient proverb:
/// "He who hardcodes the backend, probes only once."
#[derive(Debug)]
pub(crate) enum StoreBackend {
    Http(http_store::HttpStore),
    InMemory(in_mem_store::InMemoryStore),
}

#[async_trait]
impl KvStore for StoreBackend {
    async fn read_index(&mut self) -> Result<ProbeResponse> {
        match self {
            StoreBackend::Http(s) => s.read_index().await,
            StoreBackend::InMemory(s) => s.read_index().await,
        }
    }

    async fn read_item(&mut self, item: &str, sort_key: &str) -> Result<ProbeResponse> {
        match self {
            StoreBackend::Http(s) => s.read_item(item, sort_key).await,
            StoreBackend::InMemory(s) => s.read_item(item, sort_key).await,
        }
    }

    async fn insert_item(
        &mut self,
        item: &str,
        sort_key: &str,
        value: Vec<u8>,
        causality: Option<&CausalityToken>,
    ) -> Result<ProbeResponse> {
        match self {
            StoreBackend::Http(s) => s.insert_item(item, sort_key, value, causality).await,
            StoreBackend::InMemory(s) => s.insert_item(item, sort_key, value, causality).await,
        }
    }
}
