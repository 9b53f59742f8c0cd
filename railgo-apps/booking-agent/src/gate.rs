//!  Railgo Booking Agent
//!
//!  Copyright (C) 2026  Railgo Contributors
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Queue Admission Gate
//!
//! During contention windows every write call must carry a token proving the
//! caller passed the demand-limiting queue. The handshake is
//! enter -> poll check while waiting -> complete, against a queue server
//! shared by both backends; only the service/action ids, the cache TTL and
//! the response syntax differ per backend.
//!
//! Tokens are cached with a TTL shorter than the server-side validity so a
//! near-expiry token is never presented. Any handshake failure clears the
//! cache before surfacing, so a retry starts clean.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::RailError;
use crate::notice::NoticeSink;

const QUEUE_URL: &str = "http://nf.letskorail.com/ts.wseq";

const OP_ENTER: &str = "5101";
const OP_CHECK: &str = "5002";
const OP_COMPLETE: &str = "5004";

const STATUS_PASS: &str = "200";
const STATUS_WAIT: &str = "201";
const STATUS_ALREADY_COMPLETED: &str = "502";

/// How the queue server wraps its reply for this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSyntax {
    /// Payload inside a `NetFunnel.gControl.result='...'` JS assignment.
    JsWrapped,
    /// Bare `status:key=...&nwait=...` payload.
    Plain,
}

/// Per-backend parameters of the shared admission protocol.
#[derive(Debug, Clone)]
pub struct GateProfile {
    pub service_id: &'static str,
    pub action_id: &'static str,
    pub token_ttl: Duration,
    pub syntax: GateSyntax,
    /// The first backend's browser shim sends extra cache-buster fields.
    pub with_cache_buster: bool,
}

impl GateProfile {
    pub fn srt() -> Self {
        GateProfile {
            service_id: "service_1",
            action_id: "act_10",
            token_ttl: Duration::from_secs(48),
            syntax: GateSyntax::JsWrapped,
            with_cache_buster: true,
        }
    }

    pub fn korail() -> Self {
        GateProfile {
            service_id: "service_1",
            action_id: "act_8",
            token_ttl: Duration::from_secs(50),
            syntax: GateSyntax::Plain,
            with_cache_buster: false,
        }
    }
}

/// One decoded queue-server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReply {
    pub status: String,
    pub key: Option<String>,
    pub waiting_count: Option<u64>,
}

static JS_RESULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NetFunnel\.gControl\.result='([^']+)'").unwrap());

fn param_map(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

fn reply_from(status: &str, query: &str) -> GateReply {
    let params = param_map(query);
    let lookup = |name: &str| {
        params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    };
    GateReply {
        status: status.to_string(),
        key: lookup("key"),
        waiting_count: lookup("nwait").and_then(|n| n.parse().ok()),
    }
}

/// Decode a JS-wrapped reply: `...result='<code>:<status>:<params>'...`.
pub fn parse_js_wrapped(body: &str) -> Result<GateReply, RailError> {
    let captured = JS_RESULT_RE
        .captures(body)
        .ok_or_else(|| RailError::Protocol("queue reply missing result assignment".into()))?;
    let inner = &captured[1];
    let mut parts = inner.splitn(3, ':');
    let _code = parts.next();
    let status = parts
        .next()
        .ok_or_else(|| RailError::Protocol(format!("queue reply missing status: {inner:?}")))?;
    let query = parts.next().unwrap_or("");
    Ok(reply_from(status, query))
}

/// Decode a bare reply: `<status>:<params>`.
pub fn parse_plain(body: &str) -> Result<GateReply, RailError> {
    let (status, query) = body
        .split_once(':')
        .ok_or_else(|| RailError::Protocol(format!("queue reply not status:params: {body:?}")))?;
    Ok(reply_from(status.trim(), query))
}

/// Transport seam for the queue server, narrow enough to script in tests.
#[allow(async_fn_in_trait)]
pub trait GateTransport {
    async fn fetch(&self, params: &[(String, String)]) -> Result<String, RailError>;
}

/// Production transport: plain GET with the backend's user agent.
#[derive(Debug, Clone)]
pub struct HttpGateTransport {
    client: wreq::Client,
}

impl HttpGateTransport {
    pub fn new(user_agent: &str) -> Result<Self, RailError> {
        let client = wreq::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(RailError::Network)?;
        Ok(HttpGateTransport { client })
    }
}

impl GateTransport for HttpGateTransport {
    async fn fetch(&self, params: &[(String, String)]) -> Result<String, RailError> {
        let response = self
            .client
            .get(QUEUE_URL)
            .query(params)
            .send()
            .await
            .map_err(RailError::Network)?;
        response.text().await.map_err(RailError::Network)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    key: String,
    acquired: Instant,
}

/// Owns the admission handshake and the token cache for one session.
#[derive(Debug, Clone)]
pub struct AdmissionGate<T> {
    transport: T,
    profile: GateProfile,
    cached: Option<CachedToken>,
}

impl<T: GateTransport> AdmissionGate<T> {
    pub fn with_transport(profile: GateProfile, transport: T) -> Self {
        AdmissionGate {
            transport,
            profile,
            cached: None,
        }
    }

    /// Drop the cached token; the next `run` performs a full handshake.
    pub fn clear(&mut self) {
        self.cached = None;
    }

    /// Return a token, from cache when younger than the TTL, otherwise via
    /// the full handshake. Queue position is surfaced through `notice`
    /// while waiting. Any failure clears the cache and is retryable.
    pub async fn run(&mut self, notice: &dyn NoticeSink) -> Result<String, RailError> {
        if let Some(token) = &self.cached {
            if token.acquired.elapsed() < self.profile.token_ttl {
                return Ok(token.key.clone());
            }
        }

        let acquired = Instant::now();
        match self.handshake(notice).await {
            Ok(key) => {
                self.cached = Some(CachedToken {
                    key: key.clone(),
                    acquired,
                });
                Ok(key)
            }
            Err(err) => {
                self.clear();
                match err {
                    queue @ RailError::Queue(_) => Err(queue),
                    other => Err(RailError::Queue(other.to_string())),
                }
            }
        }
    }

    async fn handshake(&self, notice: &dyn NoticeSink) -> Result<String, RailError> {
        let mut reply = self.call(OP_ENTER, None).await?;
        let mut key = reply
            .key
            .clone()
            .ok_or_else(|| RailError::Queue("enter reply carried no key".into()))?;

        while reply.status == STATUS_WAIT {
            if let Some(waiting) = reply.waiting_count {
                notice.notice(&format!("{waiting} ahead in the admission queue"));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            reply = self.call(OP_CHECK, Some(&key)).await?;
            if let Some(fresh) = reply.key.clone() {
                key = fresh;
            }
        }

        // Complete exactly once; 502 means another call already did.
        let done = self.call(OP_COMPLETE, Some(&key)).await?;
        if done.status == STATUS_PASS || done.status == STATUS_ALREADY_COMPLETED {
            Ok(key)
        } else {
            Err(RailError::Queue(format!(
                "completion rejected with status {}",
                done.status
            )))
        }
    }

    async fn call(&self, opcode: &str, key: Option<&str>) -> Result<GateReply, RailError> {
        let params = self.build_params(opcode, key);
        tracing::trace!(opcode, "admission gate request");
        let body = self.transport.fetch(&params).await?;
        tracing::trace!(opcode, bytes = body.len(), "admission gate reply");
        match self.profile.syntax {
            GateSyntax::JsWrapped => parse_js_wrapped(&body),
            GateSyntax::Plain => parse_plain(&body),
        }
    }

    fn build_params(&self, opcode: &str, key: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![("opcode".to_string(), opcode.to_string())];

        if self.profile.with_cache_buster {
            params.push(("nfid".into(), "0".into()));
            params.push(("prefix".into(), format!("NetFunnel.gRtype={opcode};")));
            params.push(("js".into(), "true".into()));
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            params.push((millis.to_string(), String::new()));
        }

        match opcode {
            OP_ENTER | OP_CHECK => {
                params.push(("sid".into(), self.profile.service_id.into()));
                params.push(("aid".into(), self.profile.action_id.into()));
                if opcode == OP_CHECK {
                    if let Some(key) = key {
                        params.push(("key".into(), key.to_string()));
                    }
                    params.push(("ttl".into(), "1".into()));
                }
            }
            OP_COMPLETE => {
                if let Some(key) = key {
                    params.push(("key".into(), key.to_string()));
                }
            }
            _ => {}
        }

        params
    }
}

impl AdmissionGate<HttpGateTransport> {
    pub fn new(profile: GateProfile, user_agent: &str) -> Result<Self, RailError> {
        let transport = HttpGateTransport::new(user_agent)?;
        Ok(AdmissionGate::with_transport(profile, transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_js_wrapped_reply() {
        let body = "NetFunnel.gControl.result='5101:200:key=ABC123&nwait=0&tps=1'; \
                    NetFunnel.gControl._showResult();";
        let reply = parse_js_wrapped(body).expect("parses");
        assert_eq!(reply.status, "200");
        assert_eq!(reply.key.as_deref(), Some("ABC123"));
        assert_eq!(reply.waiting_count, Some(0));
    }

    #[test]
    fn parses_plain_reply() {
        let reply = parse_plain("201:key=XYZ&nwait=42").expect("parses");
        assert_eq!(reply.status, "201");
        assert_eq!(reply.key.as_deref(), Some("XYZ"));
        assert_eq!(reply.waiting_count, Some(42));
    }

    #[test]
    fn rejects_unwrapped_garbage() {
        assert!(parse_js_wrapped("<html>maintenance</html>").is_err());
        assert!(parse_plain("no separator here").is_err());
    }

    #[test]
    fn enter_params_have_service_and_action() {
        let gate = AdmissionGate::with_transport(GateProfile::korail(), DummyTransport);
        let params = gate.build_params(OP_ENTER, None);
        assert!(params.contains(&("sid".into(), "service_1".into())));
        assert!(params.contains(&("aid".into(), "act_8".into())));
        assert!(!params.iter().any(|(k, _)| k == "key"));
    }

    #[test]
    fn check_params_carry_key_and_ttl() {
        let gate = AdmissionGate::with_transport(GateProfile::srt(), DummyTransport);
        let params = gate.build_params(OP_CHECK, Some("K"));
        assert!(params.contains(&("key".into(), "K".into())));
        assert!(params.contains(&("ttl".into(), "1".into())));
        assert!(params.contains(&("js".into(), "true".into())));
    }

    struct DummyTransport;

    impl GateTransport for DummyTransport {
        async fn fetch(&self, _params: &[(String, String)]) -> Result<String, RailError> {
            Err(RailError::Queue("dummy".into()))
        }
    }
}
