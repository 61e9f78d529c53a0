//! Mock inference server shared by the integration tests.

#![allow(dead_code)]

use bitnet_scribe::InferenceConfig;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::net::TcpListener;

pub const COMPLETION_PATH: &str = "/completion";

/// Test fixture wrapping a mockito server that plays the completion endpoint.
pub struct MockServerFixture {
    pub server: ServerGuard,
}

impl MockServerFixture {
    pub fn new() -> Self {
        Self {
            server: Server::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.server.url(), COMPLETION_PATH)
    }

    /// Short-timeout configuration pointed at this server.
    pub fn config(&self) -> InferenceConfig {
        InferenceConfig {
            timeout_secs: 5.0,
            ..InferenceConfig::for_endpoint(self.endpoint())
        }
    }

    pub fn mock_completion(&mut self, status: usize, body: &str) -> Mock {
        self.mock_completion_times(status, body, 1)
    }

    /// A completion mock expected to be hit exactly `hits` times.
    pub fn mock_completion_times(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", COMPLETION_PATH)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create()
    }

    /// A completion mock that only matches when the request body contains every fragment.
    pub fn mock_completion_for(&mut self, fragments: &[&str], body: &str) -> Mock {
        let matchers = fragments
            .iter()
            .map(|f| Matcher::Regex(regex_escape(f)))
            .collect();
        self.server
            .mock("POST", COMPLETION_PATH)
            .match_body(Matcher::AllOf(matchers))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create()
    }

    pub fn mock_get(&mut self, path: &str, status: usize) -> Mock {
        self.mock_get_times(path, status, 1)
    }

    pub fn mock_get_times(&mut self, path: &str, status: usize, hits: usize) -> Mock {
        self.server
            .mock("GET", path)
            .with_status(status)
            .with_body("")
            .expect(hits)
            .create()
    }
}

/// Endpoint on a local port with nothing listening.
pub fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, COMPLETION_PATH)
}

/// A listener that accepts TCP connections but never answers.
///
/// Keep the returned listener alive for the duration of the test.
pub fn silent_endpoint() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("http://127.0.0.1:{}{}", port, COMPLETION_PATH))
}

pub fn content_body(text: &str) -> String {
    serde_json::json!({ "content": text }).to_string()
}

fn regex_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            let special = "\\.+*?()|[]{}^$".contains(c);
            special.then_some('\\').into_iter().chain(std::iter::once(c))
        })
        .collect()
}
