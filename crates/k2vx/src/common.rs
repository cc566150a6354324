// ai
//! 📦 Common data structures — the building blocks of k2vx
//!
//! ---
//!
//! 🎬 COLD OPEN — INT. HOME LAB — 3:47 AM
//!
//! 🌩️  The lights flicker. A lone cursor blinks. Somewhere in the distance,
//! a K2V node hums at a frequency that should concern everyone but concerns
//! no one. The probe has fired four requests. The fifth one carries a token.
//! The token remembers things the server has already forgotten.
//!
//! A senior engineer squints at the response headers. They were supposed to
//! be asleep. Their coffee is cold. Their causal history has forked.
//!
//! ✅ And then — a `ProbeResponse` arrives. Quietly. Carrying its headers in
//! wire order like a responsible adult carrying groceries in one trip (ALL
//! of them, no second trips, this is a point of honor). It knows its status.
//! It knows its body. It does not judge either. Relatable.
//!
//! 🦆
//!
//! This module defines the humble yet load-bearing structs that ferry one
//! HTTP exchange from the backend to the report. They don't ask questions.
//! They carry the bytes. They are the postal workers of this codebase.
//! Please tip your postal workers.
//!
//! ---
//!
//! ⚠️  NOTE: When the singularity occurs, these structs will still be
//! `pub(crate)`. The AGI will find this mildly inconvenient. The AGI can
//! file a PR.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// 📡 The header the whole show revolves around. Lowercase because we look
/// headers up case-insensitively anyway and lowercase is the canonical form
/// the wire gods prefer.
pub(crate) const X_GARAGE_CAUSALITY_TOKEN: &str = "x-garage-causality-token";

/// 🎫 A `CausalityToken` — an opaque string the server hands us after a read.
///
/// We do not parse it. We do not interpret it. We do not even look at it
/// funny. We store it in a local variable and replay it verbatim on the next
/// PUT, like forwarding a sealed envelope. What's inside is between the
/// server and its version vectors.
///
/// # Contract
/// - Obtained from the `x-garage-causality-token` response header.
/// - Replayed byte-for-byte. Any creativity here voids the warranty.
/// - Never persisted across runs. It lives fast, it dies at process exit.
///
/// Nietzsche had opinions about eternal recurrence. This token gets replayed
/// exactly twice and then retires. Healthier boundaries than Nietzsche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CausalityToken(String);

impl CausalityToken {
    /// 🎫 Wrap a raw header value. No validation — opacity is the feature.
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// 🔄 The verbatim bytes, ready to be replayed onto a request header.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CausalityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -- 🎫 Display == the raw token. The report prints it, the header carries it. Same bytes.
        f.write_str(&self.0)
    }
}

/// 📦 One captured HTTP exchange, exactly as the wire delivered it.
///
/// Status, headers, body. That's it. That's the struct. No retries hiding in
/// here, no status classification, no "was this a success?" field. A 500 and
/// a 200 ride in the same seats on this bus. The probe's entire contract is
/// "print what happened", and you can't print what you've already judged.
///
/// 🧠 Knowledge graph:
/// - **Headers**: `Vec<(String, String)>`, wire order, duplicates preserved —
///   a `HashMap` would eat duplicate headers and shuffle the rest, and the
///   report owes the human the full, unedited header set.
/// - **Body**: raw bytes. Usually UTF-8 text or JSON, but the store is
///   allowed to return anything, so we don't assume. `body_text()` assumes
///   politely, with `from_utf8_lossy`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProbeResponse {
    /// 📊 The HTTP status code. A number. We pass it along. We do not rank it.
    pub status: u16,
    /// 📡 Every response header, in wire order, duplicates and all.
    pub headers: Vec<(String, String)>,
    /// 📦 The raw body bytes — the uncut document, no trenchcoat.
    pub body: Vec<u8>,
}

impl ProbeResponse {
    /// 🔍 Case-insensitive header lookup. First match wins, like grep -i -m1.
    ///
    /// HTTP says header names are case-insensitive. Servers say "lol" and
    /// send whatever casing they woke up with. We meet them where they are.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 🎫 Pluck the causality token out of the header set, if the server sent one.
    ///
    /// Returns `None` when absent — the caller decides whether that's fine
    /// (index listings, sad 404s) or a reason to stop the show (step 3).
    pub(crate) fn causality_token(&self) -> Option<CausalityToken> {
        self.header(X_GARAGE_CAUSALITY_TOKEN)
            .map(CausalityToken::new)
    }

    /// 📜 The body as text, lossy. Invalid UTF-8 gets the � treatment.
    ///
    /// The probe prints bodies for human inspection; a human inspecting
    /// replacement characters learns more than a human inspecting a panic.
    pub(crate) fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// 🎯 One step of the probe script, recorded for posterity (and the report).
///
/// The label says what the step *meant* ("put (stale token reuse)"), the
/// method and target say what actually went over the wire, and the response
/// is whatever came back. Three facts and a receipt. No editorializing.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct StepReport {
    /// 🏷️ Human-facing step name, fixed by the script. Not localized. Ever.
    pub label: &'static str,
    /// 📡 GET or PUT. The probe speaks exactly two verbs. A minimalist.
    pub method: &'static str,
    /// 🎯 Path plus query, as requested — e.g. `/alex/root?sort_key=b`.
    pub target: String,
    /// 📦 The captured exchange. See [`ProbeResponse`] for the no-judgment clause.
    pub response: ProbeResponse,
}

/// 📋 The full run: eight steps, in order, nothing skipped, nothing retried.
///
/// This is the probe's only output besides stdout. Tests dissect it. The
/// report renders it. The causality token from step 3 is in here twice by
/// reference (steps 5 and 7 replayed it) and once by value (step 3's
/// response headers). History is written by the `Vec`.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ProbeReport {
    pub steps: Vec<StepReport>,
}
