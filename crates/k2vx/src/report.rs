// AI
//! 📊 report.rs — "So... what happened?" — every probe run, every time, forever.
//!
//! 🚀 This module answers that question the only way the probe is allowed to:
//! by printing EXACTLY what came back. Status lines, the full header set in
//! wire order, bodies as text. No grading. No "✅ PASS". The probe is a
//! stenographer; this file is the stenograph.
//!
//! The one courtesy we extend: when a response is the JSON-array-of-base64
//! conflict representation, we ALSO print a decoded view of each concurrent
//! value, because nobody should have to read base64 at 3am. The raw body is
//! still printed first. The transcript remains unedited.
//!
//! ⚠️  Warning: Watching the step bar will not make the network go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::common::{ProbeReport, ProbeResponse, StepReport};

/// 🎨 Build the step progress bar the probe ticks while it works.
/// Cyan because it's classy, blue because it's calm.
pub(crate) fn step_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] step {pos}/{len}")
            .unwrap() // -- 🐛 safe unwrap: template string is hardcoded and valid, I checked, twice
            .progress_chars("=>-"),
    );
    bar
}

/// 📜 Print the whole transcript: every step raw, then the summary table.
/// This is the probe's deliverable. Everything else was logistics.
pub(crate) fn render(report: &ProbeReport) {
    for (number, step) in report.steps.iter().enumerate() {
        render_step(number + 1, step);
    }
    println!();
    println!("{}", summary_table(report));
}

/// 📡 One step, dumped raw: what we asked, what came back, all of it.
fn render_step(number: usize, step: &StepReport) {
    println!();
    println!(
        "=== step {}: {} — {} {}",
        number, step.label, step.method, step.target
    );
    println!("HTTP {}", step.response.status);
    // -- 📋 headers in wire order, duplicates and all. the human gets the
    // -- full set, exactly as the server sent it. no curation.
    for (name, value) in &step.response.headers {
        println!("  {}: {}", name, value);
    }
    let body = step.response.body_text();
    if !body.is_empty() {
        println!("{}", body);
    }

    // 🔀 courtesy decode for the conflict representation — the raw body is
    // already above; this is the same data wearing its human face.
    if let Some(values) = decode_concurrent_values(&step.response) {
        println!("  -- {} concurrent value(s), decoded:", values.len());
        for value in &values {
            println!("  * {}", value);
        }
    }
}

/// 🔀 If the response is the conflict representation — a JSON array of
/// base64 strings (nulls for tombstones) — decode each entry for display.
///
/// Returns `None` for anything else: raw single values, index listings
/// (JSON, but an object), bodies that only LOOK like they might cooperate.
/// We decode opportunistically and fail silently — this is garnish, not data.
fn decode_concurrent_values(response: &ProbeResponse) -> Option<Vec<String>> {
    let content_type = response.header("content-type")?;
    if !content_type.starts_with("application/json") {
        return None;
    }
    let parsed: Vec<Option<String>> = serde_json::from_slice(&response.body).ok()?;
    let mut values = Vec::with_capacity(parsed.len());
    for entry in parsed {
        match entry {
            // -- 🪦 null in the array = a deletion that lost a race. it gets a name.
            None => values.push("(tombstone)".to_string()),
            Some(encoded) => {
                let bytes = BASE64.decode(encoded.as_bytes()).ok()?;
                values.push(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }
    Some(values)
}

/// 🍽️ The closing summary — one row per step, token column included so a
/// human can watch the token change (and NOT change, at step 7) at a glance.
fn summary_table(report: &ProbeReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "step", "verb", "status", "causality token", "body"]);

    for (number, step) in report.steps.iter().enumerate() {
        table.add_row(vec![
            Cell::new(number + 1).set_alignment(CellAlignment::Right),
            Cell::new(step.label),
            Cell::new(step.method),
            Cell::new(step.response.status),
            Cell::new(
                step.response
                    .causality_token()
                    .map(|t| t.to_string())
                    // -- 🎫 no token, no drama. index listings live here.
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format!("{} bytes", step.response.body.len()))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::X_GARAGE_CAUSALITY_TOKEN;

    // 🧪 Renderer tests: the table and the decoder, the two parts with logic.
    // println! is not unit-testable and has never once had a bug. (citation needed)

    fn json_response(body: &str) -> ProbeResponse {
        ProbeResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn report_the_one_where_conflicts_decode_for_humans() {
        // 🧪 ["R29vZCBieWU=", "b29wcw=="] → ["Good bye", "oops"]
        let resp = json_response(r#"["R29vZCBieWU=", "b29wcw=="]"#);
        let values = decode_concurrent_values(&resp).expect("conflict arrays decode");
        assert_eq!(values, vec!["Good bye".to_string(), "oops".to_string()]);
    }

    #[test]
    fn report_the_one_where_tombstones_get_a_name() {
        let resp = json_response(r#"[null, "b29wcw=="]"#);
        let values = decode_concurrent_values(&resp).expect("nulls are tolerated");
        assert_eq!(values[0], "(tombstone)");
        assert_eq!(values[1], "oops");
    }

    #[test]
    fn report_the_one_where_index_listings_are_left_alone() {
        // 🧪 JSON, yes — but an object, not a conflict array. hands off.
        let resp = json_response(r#"{"partitionKeys":[],"more":false}"#);
        assert!(decode_concurrent_values(&resp).is_none());
    }

    #[test]
    fn report_the_one_where_raw_bytes_are_not_second_guessed() {
        // 🧪 octet-stream single values get no decode pass at all
        let resp = ProbeResponse {
            status: 200,
            headers: vec![(
                "content-type".to_string(),
                "application/octet-stream".to_string(),
            )],
            body: b"1700000000.0: Hello, world!".to_vec(),
        };
        assert!(decode_concurrent_values(&resp).is_none());
    }

    #[test]
    fn report_the_one_where_the_table_seats_every_step() {
        let report = ProbeReport {
            steps: vec![
                StepReport {
                    label: "read-index (before)",
                    method: "GET",
                    target: "/alex".to_string(),
                    response: json_response(r#"{"partitionKeys":[]}"#),
                },
                StepReport {
                    label: "get (capture token)",
                    method: "GET",
                    target: "/alex/root?sort_key=b".to_string(),
                    response: ProbeResponse {
                        status: 200,
                        headers: vec![(
                            X_GARAGE_CAUSALITY_TOKEN.to_string(),
                            "tok-42".to_string(),
                        )],
                        body: b"hi".to_vec(),
                    },
                },
            ],
        };

        let rendered = summary_table(&report).to_string();
        assert!(rendered.contains("read-index (before)"));
        assert!(rendered.contains("get (capture token)"));
        assert!(rendered.contains("tok-42"));
        assert!(rendered.contains("2 bytes"));
    }
}
