use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::KvStore;
use crate::common::{CausalityToken, ProbeResponse, X_GARAGE_CAUSALITY_TOKEN};
use crate::sigv4::{canonical_query_string, uri_encode_path, Credential};

// -- 📡 accept both formats: raw bytes when one value exists, JSON when the
// -- causal history has opinions. the server picks. we print either way.
const ACCEPT_EITHER: &str = "application/octet-stream, application/json";

//
// ⚠️ Every default below is a literal from the classic probe script: the local
// endpoint, the demo keypair, the `k2v` service label. Override any of them
// in config; overriding none reproduces the classic probe.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpStoreConfig {
    /// 📡 Where the K2V API lives. Include scheme + port. Yes, all of it.
    /// No, `localhost` alone is not enough. Yes, I know it worked in dev. Yes, I know.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 🗺️ Region for the credential scope. The signature cares even when the
    /// server is three feet away on the same desk.
    #[serde(default = "default_region")]
    pub region: String,
    /// 📡 Service name in the credential scope — `k2v`, not `s3`. One letter
    /// of difference. Infinite 403s of difference.
    #[serde(default = "default_service")]
    pub service: String,
    /// 🔒 Access key. The public half of the handshake.
    #[serde(default = "default_access_key")]
    pub access_key: String,
    /// 🔒 Secret key. If this is in plaintext in your config file — well, the
    /// default one is a published demo key, so you're in good company. Rotate
    /// real ones. Please.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

fn default_endpoint() -> String {
    "http://localhost:3812".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_service() -> String {
    "k2v".to_string()
}
fn default_access_key() -> String {
    "GK31c2f218a2e44f485b94239e".to_string()
}
fn default_secret_key() -> String {
    "b892c0665f0ada8a4755dae98baa3b133590e11dae3bcc1f9d769d67f16c3835".to_string()
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        // -- 🔧 serde defaults and Default::default agree by construction
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            service: default_service(),
            access_key: default_access_key(),
            secret_key: default_secret_key(),
        }
    }
}

/// 📡 The real backend — signed HTTP against a live K2V server.
///
/// `HttpStore` owns one `reqwest::Client` (reused across all eight steps,
/// connection pooling included, you're welcome) plus the credential that
/// signs every outgoing request. Each operation builds a path and query,
/// signs EXACTLY those bytes, then sends EXACTLY those bytes. The symmetry
/// is not aesthetic. The symmetry is the authentication.
///
/// 🧠 Knowledge graph: this store never judges a status code. A 404 is a
/// response. A 409 is a response. A 500 is a response with main-character
/// energy. All of them come back as `Ok(ProbeResponse)` for the report to
/// print. Only transport failures — nothing came back at all — are errors.
///
/// 🚰 Think of it as a pneumatic tube to the server. The tube does not read
/// your mail. The tube delivers the mail. Knock knock. Who's there? HTTP
/// GET. HTTP GET who? HTTP GET your index listing and hope the cluster's in
/// a good mood.
#[derive(Debug)]
pub(crate) struct HttpStore {
    client: reqwest::Client,
    credential: Credential,
    /// 📡 endpoint with any trailing slash shaved off — the `/` hygiene you
    /// didn't know you needed. One slash of difference. Infinite suffering.
    endpoint: String,
    /// 🏠 the host:port that goes in the canonical headers — must match what
    /// the URL resolves to or the server's recomputation won't.
    host: String,
    bucket: String,
}

impl HttpStore {
    /// 🚀 Stand up a new `HttpStore`, fully wired and ready to probe.
    ///
    /// Builds the `reqwest::Client` with sane timeouts (10s connect, 30s
    /// response). Like a polite person — we will wait, but not forever.
    /// No connectivity ping here: the probe's first step IS the ping, and
    /// its output belongs to the human, not to a constructor.
    pub(crate) fn new(config: HttpStoreConfig, bucket: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            // -- 💀 "Failed to initialize http client" — a tragedy in one act.
            // -- The curtain rises. reqwest::Client::builder() enters, full of promise.
            // -- It calls .build(). The TLS stack hesitates. The operating system shrugs.
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert store or a cursed system OpenSSL. Either way: tragic, and also: not our fault.")?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let host = extract_host(&endpoint).with_context(|| {
            format!(
                "💀 Could not find a host inside endpoint '{}'. An endpoint needs a scheme, a host, and ideally a port. This one is missing at least the middle part, which is the load-bearing part.",
                config.endpoint
            )
        })?;

        let credential = Credential {
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
            service: config.service.clone(),
        };

        Ok(Self {
            client,
            credential,
            endpoint,
            host,
            bucket,
        })
    }

    /// 📡 Sign it, send it, capture it. The one road every request travels.
    ///
    /// The signed query string and the wire query string come from the same
    /// `canonical_query_string` call — sign one thing and send another and
    /// the server will 403 you with the serene confidence of a bureaucrat
    /// rejecting a form filled out in the wrong ink.
    ///
    /// 🔄 This function does not retry. This function does not classify.
    /// This function delivers. The probe upstairs wanted a courier, not a
    /// critic.
    async fn dispatch(
        &self,
        method: reqwest::Method,
        path: String,
        query: &[(&str, &str)],
        body: Vec<u8>,
        causality: Option<&CausalityToken>,
    ) -> Result<ProbeResponse> {
        // 🔏 sign first — the signature wants the body bytes and the clock
        let parts = self
            .credential
            .sign(method.as_str(), &path, query, &self.host, &body, Utc::now());

        // 📡 assemble the wire URL from the SAME encoded pieces we signed
        let query_string = canonical_query_string(query);
        let url = if query_string.is_empty() {
            format!("{}{}", self.endpoint, uri_encode_path(&path))
        } else {
            format!("{}{}?{}", self.endpoint, uri_encode_path(&path), query_string)
        };

        debug!("📡 {} {} ({} body bytes)", method, url, body.len());

        let mut request = self
            .client
            .request(method, &url)
            .header("authorization", parts.authorization)
            .header("x-amz-date", parts.amz_date)
            .header("x-amz-content-sha256", parts.content_sha256)
            .header("accept", ACCEPT_EITHER);

        // 🎫 the causality token rides along only when the caller has one —
        // and it rides verbatim. unsigned, uninspected, unimproved.
        if let Some(token) = causality {
            request = request.header(X_GARAGE_CAUSALITY_TOKEN, token.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            // -- 💀 "Failed to send request" — micro-fiction, act one.
            // -- We derived the signing key. We hashed the body. We built the
            // -- canonical request with artisanal care. We called .send().
            // -- And the network layer, that capricious deity of bytes and
            // -- routing tables, looked upon our work... and dropped the packet.
            .context("💀 The request never reached the K2V server. We launched the payload into the network and the network responded with what can only be described as 'not vibing with it.' Check that the server is up, check the endpoint, check your feelings.")?;

        // 📦 capture everything, judge nothing. status as a number, headers
        // in wire order with duplicates intact, body as raw bytes.
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    // -- 📜 lossy on purpose: a weird header byte should print as
                    // -- mojibake, not kill the probe four steps in
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .context("💀 The server sent a status line and headers and then ghosted us mid-body. A response interrupted is a story without an ending. We refuse to make one up.")?
            .to_vec();

        trace!("📦 captured response: HTTP {} with {} headers", status, headers.len());
        Ok(ProbeResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl KvStore for HttpStore {
    /// 📇 `GET /{bucket}` — the index listing. No query, empty body, still signed.
    async fn read_index(&mut self) -> Result<ProbeResponse> {
        let path = format!("/{}", self.bucket);
        self.dispatch(reqwest::Method::GET, path, &[], Vec::new(), None)
            .await
    }

    /// 📖 `GET /{bucket}/{item}?sort_key={k}` — fetch whatever history exists.
    async fn read_item(&mut self, item: &str, sort_key: &str) -> Result<ProbeResponse> {
        let path = format!("/{}/{}", self.bucket, item);
        self.dispatch(
            reqwest::Method::GET,
            path,
            &[("sort_key", sort_key)],
            Vec::new(),
            None,
        )
        .await
    }

    /// ✍️ `PUT /{bucket}/{item}?sort_key={k}` — write, with or without a causal opinion.
    async fn insert_item(
        &mut self,
        item: &str,
        sort_key: &str,
        value: Vec<u8>,
        causality: Option<&CausalityToken>,
    ) -> Result<ProbeResponse> {
        let path = format!("/{}/{}", self.bucket, item);
        self.dispatch(
            reqwest::Method::PUT,
            path,
            &[("sort_key", sort_key)],
            value,
            causality,
        )
        .await
    }
}

/// 🏠 Extract host (and port) from an endpoint URL. Scheme off, path off, host out.
fn extract_host(endpoint: &str) -> Option<String> {
    let host = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"))?;
    let host = host.split('/').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 🧪 HTTP store tests — wiremock plays the K2V server. A stunt double
    // with perfect recall and zero storage engine.

    // -- 🧂 the famous hash of nothing. every GET in this file sends it.
    const EMPTY_BODY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn store_for(server: &MockServer) -> HttpStore {
        let config = HttpStoreConfig {
            endpoint: server.uri(),
            ..HttpStoreConfig::default()
        };
        HttpStore::new(config, "alex".to_string()).expect("client should build")
    }

    #[tokio::test]
    async fn http_the_one_where_read_index_arrives_signed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alex"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .and(header("x-amz-content-sha256", EMPTY_BODY_SHA256))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"partitionKeys":[],"more":false}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut store = store_for(&server);
        let resp = store.read_index().await.expect("transport should succeed");
        assert_eq!(resp.status, 200);
        assert!(resp.body_text().contains("partitionKeys"));

        // -- 🔏 and the authorization header has the right opening line
        let requests = server.received_requests().await.expect("recording is on");
        let auth = requests[0]
            .headers
            .get("authorization")
            .expect("authorization was sent")
            .to_str()
            .expect("authorization is ascii");
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential="));
        assert!(auth.contains("/us-east-1/k2v/aws4_request"));
    }

    #[tokio::test]
    async fn http_the_one_where_the_token_rides_the_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/alex/root"))
            .and(query_param("sort_key", "b"))
            .and(header("x-garage-causality-token", "tok-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = store_for(&server);
        let token = CausalityToken::new("tok-1");
        let resp = store
            .insert_item("root", "b", b"payload".to_vec(), Some(&token))
            .await
            .expect("transport should succeed");
        assert_eq!(resp.status, 200);

        // -- 📦 the body went over the wire untouched
        let requests = server.received_requests().await.expect("recording is on");
        assert_eq!(requests[0].body, b"payload".to_vec());
    }

    #[tokio::test]
    async fn http_the_one_where_no_token_means_no_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/alex/root"))
            .and(query_param("sort_key", "b"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = store_for(&server);
        store
            .insert_item("root", "b", b"unconditional".to_vec(), None)
            .await
            .expect("transport should succeed");

        // 🧪 an unconditional put makes no causal claims — header must be absent
        let requests = server.received_requests().await.expect("recording is on");
        assert!(requests[0].headers.get("x-garage-causality-token").is_none());
    }

    #[tokio::test]
    async fn http_the_one_where_a_404_is_just_another_tuesday() {
        // 🧪 house rule: HTTP errors are printable content, not Rust errors
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alex/root"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such key"))
            .mount(&server)
            .await;

        let mut store = store_for(&server);
        let resp = store
            .read_item("root", "b")
            .await
            .expect("a 404 is a response, not a transport failure");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body_text(), "No such key");
        assert!(resp.causality_token().is_none());
    }

    #[test]
    fn http_the_one_where_hosts_get_extracted() {
        assert_eq!(
            extract_host("http://localhost:3812").as_deref(),
            Some("localhost:3812")
        );
        assert_eq!(
            extract_host("https://k2v.example.com/ignored/path").as_deref(),
            Some("k2v.example.com")
        );
        assert_eq!(extract_host("not-a-url"), None);
        assert_eq!(extract_host("http://"), None);
    }
}
