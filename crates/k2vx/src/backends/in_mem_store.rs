use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::sync::Mutex;

use crate::backends::KvStore;
use crate::common::{CausalityToken, ProbeResponse, X_GARAGE_CAUSALITY_TOKEN};

/// 📼 One journal entry — what the probe asked of us, arguments and all.
///
/// The tests replay history off this journal: call order, verbatim token
/// replay, exact bodies. It's the flight recorder, except nothing crashed
/// (usually).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalOp {
    ReadIndex,
    ReadItem {
        item: String,
        sort_key: String,
    },
    InsertItem {
        item: String,
        sort_key: String,
        value: Vec<u8>,
        /// 🎫 the raw token string as received — None for unconditional writes
        causality: Option<String>,
    },
}

// -- 🗃️ the store proper: live versions per (item, sort key). each version is
// -- (id, bytes). ids are handed out by a counter and never reused.
#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<(String, String), Vec<(u64, Vec<u8>)>>,
    next_version: u64,
}

/// 📦 A K2V store that lives entirely in RAM and remembers everything.
/// Unlike my dad, who forgot my soccer game in 1998.
///
/// `InMemoryStore` implements the same causal semantics the real server
/// enforces, at BTreeMap scale:
///
/// - A read returns a token encoding the version ids it saw.
/// - A write WITH a token discards exactly the versions that token covers
///   and adds one fresh version — "I read X, replace X".
/// - A write WITHOUT a token discards nothing — a write with no causal
///   opinion coexists with whatever is already there. Two unconditional
///   writes? Two concurrent values. The store is not here to pick winners.
///
/// 🔒 The `Arc<Mutex<...>>` pair is an existential nesting doll: the store
/// is Clone so tests can keep a handle, hand `self` to the probe, and peek
/// at the journal afterwards. Communist data, but in a good way. The borrow
/// checker approved. Barely. It had notes.
///
/// 🧠 Knowledge graph: responses are shaped exactly like the real server's —
/// raw bytes + octet-stream for a single value, pretty-printed JSON array of
/// base64 strings for concurrent values, 404 for nothing, 400 for a token
/// that doesn't parse. The probe cannot tell us apart from the wire. That is
/// the entire job description.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<State>>,
    /// 📼 The evidence locker. Every operation, in order, with its arguments.
    /// Arc so multiple owners can hold a reference. Mutex so only one panics at a time.
    pub(crate) journal: Arc<Mutex<Vec<JournalOp>>>,
}

impl InMemoryStore {
    /// 🚀 An empty store, full of potential, unmarred by versions.
    /// This is the most hopeful a BTreeMap will ever be. Downhill from here.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // 🎫 token encoding: the version ids seen at read time, dash-joined.
    // Opaque to clients by contract; transparent to us because we printed it.
    fn encode_token(ids: &[u64]) -> String {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }

    // 🎫 token decoding: the reverse. A token we never minted fails to parse
    // and the write gets a 400, same as the real server's "Invalid causality
    // token" complaint.
    fn decode_token(raw: &str) -> Option<Vec<u64>> {
        raw.split('-')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    }

    // 📇 the index document, shaped like the real server's ReadIndexResponse:
    // partition keys with entry/conflict/value/byte counts, pagination fields
    // permanently at rest because the whole store fits in one screen.
    async fn render_index(&self) -> String {
        let state = self.state.lock().await;

        // -- 🗂️ aggregate per partition key (the item name). BTreeMap keeps
        // -- the listing sorted so two quiet listings are byte-identical.
        let mut partitions: BTreeMap<&str, (u64, u64, u64, u64)> = BTreeMap::new();
        for ((item, _sort_key), versions) in state.entries.iter() {
            let slot = partitions.entry(item.as_str()).or_insert((0, 0, 0, 0));
            slot.0 += 1; // entries: one per sort key
            if versions.len() > 1 {
                slot.1 += 1; // conflicts: sort keys with concurrent values
            }
            slot.2 += versions.len() as u64; // values: every concurrent value counts
            slot.3 += versions.iter().map(|(_, v)| v.len() as u64).sum::<u64>();
        }

        let partition_keys: Vec<serde_json::Value> = partitions
            .iter()
            .map(|(pk, (entries, conflicts, values, bytes))| {
                serde_json::json!({
                    "pk": pk,
                    "entries": entries,
                    "conflicts": conflicts,
                    "values": values,
                    "bytes": bytes,
                })
            })
            .collect();

        let doc = serde_json::json!({
            "prefix": null,
            "start": null,
            "end": null,
            "limit": null,
            "partitionKeys": partition_keys,
            "more": false,
            "nextStart": null,
        });

        // -- 📜 pretty-printed, like the real thing. humans read this output.
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn read_index(&mut self) -> Result<ProbeResponse> {
        self.journal.lock().await.push(JournalOp::ReadIndex);
        let body = self.render_index().await;
        Ok(ProbeResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into_bytes(),
        })
    }

    async fn read_item(&mut self, item: &str, sort_key: &str) -> Result<ProbeResponse> {
        self.journal.lock().await.push(JournalOp::ReadItem {
            item: item.to_string(),
            sort_key: sort_key.to_string(),
        });

        let state = self.state.lock().await;
        let versions = match state.entries.get(&(item.to_string(), sort_key.to_string())) {
            Some(v) if !v.is_empty() => v,
            // -- 💀 nothing here. 404, no token — absence has no causal history.
            _ => {
                return Ok(ProbeResponse {
                    status: 404,
                    headers: vec![],
                    body: b"No such key".to_vec(),
                });
            }
        };

        let ids: Vec<u64> = versions.iter().map(|(id, _)| *id).collect();
        let token = Self::encode_token(&ids);

        if versions.len() == 1 {
            // ✅ one value: raw bytes, octet-stream, token in the header.
            Ok(ProbeResponse {
                status: 200,
                headers: vec![
                    (X_GARAGE_CAUSALITY_TOKEN.to_string(), token),
                    (
                        "content-type".to_string(),
                        "application/octet-stream".to_string(),
                    ),
                ],
                body: versions[0].1.clone(),
            })
        } else {
            // 🔀 concurrent values: a JSON array of base64 strings, the
            // conflict's formal wear. The reader sorts out the family drama.
            let encoded: Vec<serde_json::Value> = versions
                .iter()
                .map(|(_, v)| serde_json::Value::String(BASE64.encode(v)))
                .collect();
            let body = serde_json::to_string_pretty(&encoded)
                .unwrap_or_else(|_| "[]".to_string());
            Ok(ProbeResponse {
                status: 200,
                headers: vec![
                    (X_GARAGE_CAUSALITY_TOKEN.to_string(), token),
                    ("content-type".to_string(), "application/json".to_string()),
                ],
                body: body.into_bytes(),
            })
        }
    }

    async fn insert_item(
        &mut self,
        item: &str,
        sort_key: &str,
        value: Vec<u8>,
        causality: Option<&CausalityToken>,
    ) -> Result<ProbeResponse> {
        self.journal.lock().await.push(JournalOp::InsertItem {
            item: item.to_string(),
            sort_key: sort_key.to_string(),
            value: value.clone(),
            causality: causality.map(|t| t.as_str().to_string()),
        });

        // 🎫 a token that doesn't parse gets the real server's 400, verbatim-ish
        let covered: Vec<u64> = match causality {
            Some(token) => match Self::decode_token(token.as_str()) {
                Some(ids) => ids,
                None => {
                    return Ok(ProbeResponse {
                        status: 400,
                        headers: vec![],
                        body: b"Invalid causality token".to_vec(),
                    });
                }
            },
            None => Vec::new(),
        };

        let mut state = self.state.lock().await;
        let fresh_id = state.next_version;
        state.next_version += 1;

        let versions = state
            .entries
            .entry((item.to_string(), sort_key.to_string()))
            .or_default();

        // 🔀 the causal core, two lines: drop exactly what the token saw,
        // keep everything it didn't, add the new version alongside.
        versions.retain(|(id, _)| !covered.contains(id));
        versions.push((fresh_id, value));

        // ✅ the real server answers an insert with a bare 200. So do we.
        Ok(ProbeResponse {
            status: 200,
            headers: vec![],
            body: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 🧪 Causal-semantics tests: the whole point of having a store in RAM
    // is being able to assert on version history without owning a cluster.

    async fn put(
        store: &mut InMemoryStore,
        body: &str,
        token: Option<&CausalityToken>,
    ) -> ProbeResponse {
        store
            .insert_item("root", "b", body.as_bytes().to_vec(), token)
            .await
            .expect("in-mem insert cannot fail transport")
    }

    async fn get(store: &mut InMemoryStore) -> ProbeResponse {
        store
            .read_item("root", "b")
            .await
            .expect("in-mem read cannot fail transport")
    }

    fn decode_values(resp: &ProbeResponse) -> Vec<String> {
        // -- 🔀 conflict bodies are JSON arrays of base64 — unwrap both layers
        let parsed: Vec<String> =
            serde_json::from_slice(&resp.body).expect("conflict body is a JSON string array");
        parsed
            .iter()
            .map(|v| {
                String::from_utf8(BASE64.decode(v).expect("entries are valid base64"))
                    .expect("test values are utf-8")
            })
            .collect()
    }

    #[tokio::test]
    async fn in_mem_the_one_where_an_unconditional_put_lands() {
        let mut store = InMemoryStore::new();
        assert_eq!(put(&mut store, "hello", None).await.status, 200);

        let resp = get(&mut store).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_text(), "hello");
        assert_eq!(resp.header("content-type"), Some("application/octet-stream"));
        assert!(resp.causality_token().is_some(), "reads always mint a token");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_a_conditional_put_supersedes() {
        let mut store = InMemoryStore::new();
        put(&mut store, "first", None).await;
        let t1 = get(&mut store).await.causality_token().expect("token after read");

        // ✍️ "I read t1, replace what t1 saw"
        put(&mut store, "second", Some(&t1)).await;

        let resp = get(&mut store).await;
        assert_eq!(resp.body_text(), "second", "the old value is gone, superseded");
        let t2 = resp.causality_token().expect("token after read");
        assert_ne!(t1, t2, "a new version means a new token");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_a_stale_token_forks_history() {
        let mut store = InMemoryStore::new();
        put(&mut store, "first", None).await;
        let t1 = get(&mut store).await.causality_token().expect("token after read");

        put(&mut store, "second", Some(&t1)).await;
        // 💥 replaying t1 — it covers a version that no longer exists, so this
        // write lands CONCURRENT with "second". History forks. On purpose.
        put(&mut store, "concurrent", Some(&t1)).await;

        let resp = get(&mut store).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        let values = decode_values(&resp);
        assert_eq!(values.len(), 2);
        assert!(values.contains(&"second".to_string()));
        assert!(values.contains(&"concurrent".to_string()));
        assert!(!values.contains(&"first".to_string()), "t1's world is gone");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_two_unconditional_puts_coexist() {
        // 🧪 no token = no causal opinion = nothing gets superseded
        let mut store = InMemoryStore::new();
        put(&mut store, "alpha", None).await;
        put(&mut store, "beta", None).await;

        let resp = get(&mut store).await;
        let values = decode_values(&resp);
        assert_eq!(values.len(), 2, "unconditional writes coexist, nobody wins");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_the_index_counts_the_damage() {
        let mut store = InMemoryStore::new();
        put(&mut store, "hello", None).await;
        let t1 = get(&mut store).await.causality_token().expect("token");
        put(&mut store, "goodbye!", Some(&t1)).await;
        put(&mut store, "oops-two", Some(&t1)).await;

        let resp = store.read_index().await.expect("index renders");
        let doc: serde_json::Value = serde_json::from_slice(&resp.body).expect("index is JSON");
        let pk = &doc["partitionKeys"][0];
        assert_eq!(pk["pk"], "root");
        assert_eq!(pk["entries"], 1, "one sort key");
        assert_eq!(pk["conflicts"], 1, "that sort key is conflicted");
        assert_eq!(pk["values"], 2, "two concurrent values");
        assert_eq!(pk["bytes"], 16, "eight bytes each, both counted");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_quiet_listings_are_identical() {
        // 🧪 no writes between listings → byte-identical bodies. quiet in, quiet out.
        let mut store = InMemoryStore::new();
        put(&mut store, "steady", None).await;

        let first = store.read_index().await.expect("index renders");
        let second = store.read_index().await.expect("index renders");
        assert_eq!(first.body, second.body);
    }

    #[tokio::test]
    async fn in_mem_the_one_where_nothing_is_found() {
        let mut store = InMemoryStore::new();
        let resp = get(&mut store).await;
        assert_eq!(resp.status, 404);
        assert!(resp.causality_token().is_none(), "absence has no causal history");
    }

    #[tokio::test]
    async fn in_mem_the_one_where_a_forged_token_bounces() {
        let mut store = InMemoryStore::new();
        let forged = CausalityToken::new("definitely-not-ours");
        let resp = put(&mut store, "sneaky", Some(&forged)).await;
        assert_eq!(resp.status, 400, "unparseable tokens get the real server's 400");
    }
}
