//! Shared fixtures for the wiremock integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use formschema_core::catalog::SourceEndpoints;
use formschema_core::Settings;
use serde_json::Value;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

/// Settings pointing every endpoint at the mock server, with fast polling.
pub fn settings_for(server: &MockServer) -> Settings {
    Settings {
        api_base: format!("{}/v1", server.uri()),
        poll_interval_ms: 5,
        max_poll_interval_ms: 5,
        max_poll_attempts: 10,
        request_timeout_secs: 5,
        sources: SourceEndpoints {
            uscis_base: format!("{}/uscis", server.uri()),
            eoir_base: format!("{}/eoir", server.uri()),
        },
        ..Settings::default()
    }
}

/// Answers each request with the next body in the list, repeating the last.
pub struct StatusSequence {
    bodies: Vec<Value>,
    calls: AtomicUsize,
}

impl StatusSequence {
    pub fn new(bodies: Vec<Value>) -> Self {
        Self {
            bodies,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for StatusSequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(n)
            .or(self.bodies.last())
            .cloned()
            .unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(body)
    }
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n".to_vec()
}
