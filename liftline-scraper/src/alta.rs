//! Alta lift status over plain HTTP.
//!
//! Alta publishes its lift board as JSON embedded in the status page, either
//! assigned to `window.Alta` or inside an `application/json` script tag. The
//! page is fetched, the embedded object located, and the first array of
//! named lifts found in it normalized to [`AltaLift`].

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use liftline_core::{
    constants::{BROWSER_USER_AGENT, HTTP_TIMEOUT},
    AltaLift, AltaReport, LiftlineError, Result,
};

/// Default lift status page.
pub const DEFAULT_ALTA_URL: &str = "https://www.alta.com/lift-terrain-status";

/// Alta client configuration.
#[derive(Clone, Debug)]
pub struct AltaConfig {
    /// Lift status page
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for AltaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ALTA_URL.to_string(),
            timeout: HTTP_TIMEOUT,
        }
    }
}

/// Fetches and parses the Alta lift status page.
#[derive(Clone)]
pub struct AltaClient {
    config: AltaConfig,
    http_client: reqwest::Client,
}

impl AltaClient {
    /// Creates a client.
    pub fn new(config: AltaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| LiftlineError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Fetches the current report. `Ok(None)` if the page has no lift data.
    #[instrument(skip(self))]
    pub async fn fetch_report(&self) -> Result<Option<AltaReport>> {
        let response = self
            .http_client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| LiftlineError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LiftlineError::FetchFailed(format!(
                "{} returned HTTP {}",
                self.config.url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| LiftlineError::HttpError(e.to_string()))?;
        debug!(bytes = html.len(), "Fetched Alta status page");

        match extract_lifts(&html) {
            Some(lifts) => {
                info!(lifts = lifts.len(), "Parsed Alta lift report");
                Ok(Some(AltaReport {
                    lifts,
                    fetched_at: Utc::now(),
                }))
            }
            None => {
                warn!(url = %self.config.url, "No lift data in Alta page");
                Ok(None)
            }
        }
    }
}

fn window_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)window\.Alta\s*=\s*(\{.*?\})\s*;?\s*</script>").expect("valid regex")
    })
}

fn json_script() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script[^>]*type=["']application/json["'][^>]*>(.*?)</script>"#).expect("valid regex")
    })
}

/// Finds the lift list embedded in Alta's status page markup.
pub fn extract_lifts(html: &str) -> Option<Vec<AltaLift>> {
    let candidates = window_assignment()
        .captures_iter(html)
        .chain(json_script().captures_iter(html))
        .filter_map(|c| c.get(1))
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok());

    for document in candidates {
        if let Some(raw) = find_lift_array(&document) {
            let lifts: Vec<AltaLift> = raw.iter().filter_map(Value::as_object).filter_map(normalize_lift).collect();
            if !lifts.is_empty() {
                return Some(lifts);
            }
        }
    }
    None
}

/// Depth-first search for a `lifts` array of objects.
fn find_lift_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.eq_ignore_ascii_case("lifts") {
                    if let Some(items) = child.as_array() {
                        if items.iter().any(Value::is_object) {
                            return Some(items);
                        }
                    }
                }
            }
            map.values().find_map(find_lift_array)
        }
        Value::Array(items) => items.iter().find_map(find_lift_array),
        _ => None,
    }
}

fn normalize_lift(lift: &Map<String, Value>) -> Option<AltaLift> {
    let name = first_string(lift, &["name", "title", "lift_name"])?;
    let open = match first_field(lift, &["open", "is_open", "isOpen"]) {
        Some(Value::Bool(open)) => *open,
        _ => first_string(lift, &["status", "state"])
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "open" | "opened" | "operating"))
            .unwrap_or(false),
    };
    Some(AltaLift {
        name,
        open,
        opening_at: first_string(lift, &["opening_at", "open_time", "opens_at", "opens"]),
        closing_at: first_string(lift, &["closing_at", "close_time", "closes_at", "closes"]),
    })
}

fn first_field<'a>(lift: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| lift.get(*k)).filter(|v| !v.is_null())
}

fn first_string(lift: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lift.get(*k))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WINDOW_PAGE: &str = r#"<html><head>
<script>window.Alta = {"liftStatus": {"updated": "2026-01-10", "lifts": [
  {"name": "Collins", "open": true, "opening_at": "9:00am", "closing_at": "4:00pm"},
  {"name": "Sugarloaf", "open": false, "opening_at": "9:15am"},
  {"name": "Supreme", "status": "Opened"},
  {"title": "", "open": true}
]}};</script></head><body></body></html>"#;

    const JSON_SCRIPT_PAGE: &str = r#"<html><body>
<script type="application/json" id="config">{"theme": "dark"}</script>
<script type='application/json'>{"data": [{"Lifts": [{"name": "Wildcat", "is_open": false}]}]}</script>
</body></html>"#;

    #[test]
    fn test_extract_from_window_assignment() {
        let lifts = extract_lifts(WINDOW_PAGE).unwrap();
        assert_eq!(lifts.len(), 3);
        assert_eq!(
            lifts[0],
            AltaLift {
                name: "Collins".into(),
                open: true,
                opening_at: Some("9:00am".into()),
                closing_at: Some("4:00pm".into()),
            }
        );
        assert!(!lifts[1].open);
        assert_eq!(lifts[1].closing_at, None);
        assert!(lifts[2].open);
    }

    #[test]
    fn test_extract_from_json_script() {
        let lifts = extract_lifts(JSON_SCRIPT_PAGE).unwrap();
        assert_eq!(lifts.len(), 1);
        assert_eq!(lifts[0].name, "Wildcat");
        assert!(!lifts[0].open);
    }

    #[test_case("<html></html>" ; "no scripts")]
    #[test_case("<script>window.Alta = {not json};</script>" ; "malformed json")]
    #[test_case(r#"<script>window.Alta = {"lifts": []};</script>"# ; "empty lift list")]
    fn test_extract_nothing(html: &str) {
        assert!(extract_lifts(html).is_none());
    }

    #[test_case("open", true)]
    #[test_case("Operating", true)]
    #[test_case("closed", false)]
    #[test_case("hold", false)]
    fn test_status_strings(status: &str, expected: bool) {
        let lift = serde_json::json!({"name": "Albion", "status": status});
        let lift = normalize_lift(lift.as_object().unwrap()).unwrap();
        assert_eq!(lift.open, expected);
    }

    async fn client_for(server: &MockServer) -> AltaClient {
        AltaClient::new(AltaConfig {
            url: format!("{}/lift-terrain-status", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lift-terrain-status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WINDOW_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let report = client_for(&server).await.fetch_report().await.unwrap().unwrap();
        assert_eq!(report.lifts.len(), 3);
        assert_eq!(report.open_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_page_without_lifts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        assert!(client_for(&server).await.fetch_report().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch_report().await.unwrap_err();
        assert!(matches!(err, LiftlineError::FetchFailed(_)));
    }
}
