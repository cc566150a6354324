//! 🎬 *[camera pans across a dimly lit home lab]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where every write tells the truth about what it read..."
//! 🎬 "One probe dared to lie. Twice. With the same token."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Probe module — eight steps, fixed order, no improvisation.
//!
//! This is the script the whole crate exists to perform: list the index,
//! write a value, read it back and pocket the causality token, list again,
//! write WITH the token, read, write with the SAME (now stale) token to
//! fork history on purpose, and read the wreckage. Every response is
//! recorded. No response is judged. The probe is a stenographer with a
//! progress bar.
//!
//! ⚠️ DO NOT ADD RETRIES. DO NOT ADD STATUS CHECKS.
//! ⚠️ YOU HAVE BEEN WARNED
//! 💀 THE PROBE PRINTS WHAT HAPPENED, NOT WHAT SHOULD HAVE HAPPENED
//! 🔒 Like a court reporter, but for HTTP. First rule: you don't edit the transcript.

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use tracing::debug;

use crate::app_config::ProbeConfig;
use crate::backends::{KvStore, StoreBackend};
use crate::common::{CausalityToken, ProbeReport, ProbeResponse, StepReport, X_GARAGE_CAUSALITY_TOKEN};

/// 🔢 Eight steps. Not seven. Not nine. Eight. The script is the script.
pub(crate) const STEP_COUNT: u64 = 8;

/// 🎯 The probe: one backend, one target key, one fixed sequence.
///
/// Single-threaded and fully sequential by design — the "concurrent write"
/// in step 7 is simulated by replaying a stale token, not by actual
/// parallelism. We fake the race so we can watch the collision in slow
/// motion. It's crash-test-dummy engineering and we stand by it.
pub(crate) struct Probe {
    backend: StoreBackend,
    /// 🏷️ the partition namespace — `alex`, unless config says otherwise
    bucket: String,
    /// 🏷️ the item key — `root`, a name chosen by someone who liked trees
    item: String,
    /// 🏷️ the sort key — `b`, a name chosen by someone who had already used `a`
    sort_key: String,
    /// 📊 one tick per step. watching it will not make the network faster.
    progress: ProgressBar,
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 custom Debug impl because ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("Probe")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("item", &self.item)
            .field("sort_key", &self.sort_key)
            .finish()
    }
}

impl Probe {
    /// 🚀 Birth of a Probe. It's like a baby, but with a fixed eight-item agenda.
    pub(crate) fn new(backend: StoreBackend, target: &ProbeConfig) -> Self {
        Self {
            backend,
            bucket: target.bucket.clone(),
            item: target.item.clone(),
            sort_key: target.sort_key.clone(),
            progress: crate::report::step_bar(STEP_COUNT),
        }
    }

    /// 🎬 Action. Runs the full script, returns the transcript.
    ///
    /// The ONLY way this returns `Err` is transport failure or a missing
    /// causality token at step 3 — the one header the rest of the script
    /// cannot proceed without. HTTP status codes never fail the run; they
    /// are content, and content goes in the report.
    pub(crate) async fn run(mut self) -> Result<ProbeReport> {
        let mut report = ProbeReport::default();
        let index_target = format!("/{}", self.bucket);
        let item_target = format!("/{}/{}?sort_key={}", self.bucket, self.item, self.sort_key);

        // 🎬 step 1 — ReadIndex: what does the world look like before we touch it?
        let resp = self.backend.read_index().await?;
        self.record(&mut report, "read-index (before)", "GET", index_target.clone(), resp);

        // 🎬 step 2 — Put, no precondition: a write with no causal opinion.
        // Fresh timestamped body, no token, maximum confidence.
        let resp = self
            .backend
            .insert_item(&self.item, &self.sort_key, stamp("Hello, world!"), None)
            .await?;
        self.record(&mut report, "put (no precondition)", "PUT", item_target.clone(), resp);

        // 🎬 step 3 — Get: read the value back and POCKET THE TOKEN.
        // This header is the plot. Everything after here replays it.
        let resp = self.backend.read_item(&self.item, &self.sort_key).await?;
        let token = capture_token(&resp)?;
        debug!("🎫 captured causality token: {}", token);
        self.record(&mut report, "get (capture token)", "GET", item_target.clone(), resp);

        // 🎬 step 4 — ReadIndex again: the listing, now with our fingerprints on it.
        let resp = self.backend.read_index().await?;
        self.record(&mut report, "read-index (after write)", "GET", index_target, resp);

        // 🎬 step 5 — Put, conditional: "I read that version. Replace it."
        // The token goes over verbatim. The server does the genealogy.
        let resp = self
            .backend
            .insert_item(
                &self.item,
                &self.sort_key,
                stamp("Good bye, world!"),
                Some(&token),
            )
            .await?;
        self.record(&mut report, "put (conditional)", "PUT", item_target.clone(), resp);

        // 🎬 step 6 — Get: observe the conditional write. Should be one clean value.
        let resp = self.backend.read_item(&self.item, &self.sort_key).await?;
        self.record(&mut report, "get (observe conditional)", "GET", item_target.clone(), resp);

        // 🎬 step 7 — Put, SAME token again: the deliberate lie. This token
        // describes a version that step 5 already superseded, so this write
        // lands concurrent with step 5's. A fake race, run in slow motion,
        // by one very sequential thread.
        let resp = self
            .backend
            .insert_item(
                &self.item,
                &self.sort_key,
                stamp("Concurrent value, oops"),
                Some(&token),
            )
            .await?;
        self.record(&mut report, "put (stale token reuse)", "PUT", item_target.clone(), resp);

        // 🎬 step 8 — Get, finale: how does the server present a forked
        // history? (Spoiler: a JSON array of base64, both values, no winner.)
        let resp = self.backend.read_item(&self.item, &self.sort_key).await?;
        self.record(&mut report, "get (final, conflict view)", "GET", item_target, resp);

        // ✅ curtain. clear the bar so the raw dump gets a clean stage.
        self.progress.finish_and_clear();
        Ok(report)
    }

    /// 📼 Append one step to the transcript and tick the bar. No judgment here
    /// either — this function has never even SEEN a status code taxonomy.
    fn record(
        &self,
        report: &mut ProbeReport,
        label: &'static str,
        method: &'static str,
        target: String,
        response: ProbeResponse,
    ) {
        debug!("📼 step {}: {} → HTTP {}", report.steps.len() + 1, label, response.status);
        self.progress.inc(1);
        report.steps.push(StepReport {
            label,
            method,
            target,
            response,
        });
    }
}

/// 🎫 Pull the causality token out of step 3's response, or stop the show.
///
/// The prototype script just indexed the header and died with a backtrace
/// when it was missing. We die with a sentence instead. Growth.
fn capture_token(response: &ProbeResponse) -> Result<CausalityToken> {
    response.causality_token().with_context(|| {
        format!(
            "💀 The read came back without a '{}' header, and the rest of the script is built on replaying that token. Either this server is not a K2V store, or it is having a very bad day. We cannot ethically continue either way.",
            X_GARAGE_CAUSALITY_TOKEN
        )
    })
}

/// 🕰️ A freshly timestamped body, prototype-script flavored:
/// `"1700000000.0: Hello, world!"`. The timestamp is the unique-per-write
/// marker; the text is the narrative.
fn stamp(marker: &str) -> Vec<u8> {
    let seconds = Utc::now().timestamp_millis() as f64 / 1000.0;
    format!("{:.1}: {}", seconds, marker).into_bytes()
}
