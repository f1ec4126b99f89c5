//! Webhook transport and the response envelope

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CrmError, CrmResult};

/// Request timeout used by [`WebhookClient::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("dealsheets/", env!("CARGO_PKG_VERSION"));

/// Longest slice of a non-JSON error body kept in error messages
const MAX_ERROR_BODY: usize = 300;

/// The JSON object every webhook method answers with
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    /// Method payload
    #[serde(default)]
    pub result: Value,
    /// Offset of the next page for list methods
    #[serde(default)]
    pub next: Option<u64>,
    /// Total number of items for list methods
    #[serde(default)]
    pub total: Option<u64>,
    /// Error code
    #[serde(default)]
    pub error: Option<String>,
    /// Human readable error text
    #[serde(default)]
    pub error_description: Option<String>,
}

impl Envelope {
    /// Items of a list payload.
    ///
    /// List methods answer either with an array, or with an object holding
    /// a single array (`{"prices": [...]}`).
    pub fn into_items(self) -> Vec<Value> {
        match self.result {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            Value::Object(map) => {
                let single = {
                    let mut arrays = map.values().filter_map(Value::as_array);
                    match (arrays.next(), arrays.next()) {
                        (Some(items), None) => Some(items.clone()),
                        _ => None,
                    }
                };
                single.unwrap_or_else(|| vec![Value::Object(map)])
            }
            other => vec![other],
        }
    }
}

/// Blocking client bound to one inbound webhook
#[derive(Debug, Clone)]
pub struct WebhookClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl WebhookClient {
    /// Create a client with the default timeout
    pub fn new(webhook_url: &str) -> CrmResult<Self> {
        Self::with_timeout(webhook_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(webhook_url: &str, timeout: Duration) -> CrmResult<Self> {
        let base = normalize_base(webhook_url)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CrmError::Config(e.to_string()))?;
        Ok(Self { base, http })
    }

    /// Webhook URL, always ending with `/`
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Full URL of a REST method
    pub fn method_url(&self, method: &str) -> String {
        format!("{}{}", self.base, method)
    }

    /// Call a method and return its envelope
    pub fn call(&self, method: &str, params: &Value) -> CrmResult<Envelope> {
        let url = self.method_url(method);
        tracing::debug!(method, "POST {}", redact(&url));

        let response = self
            .http
            .post(&url)
            .json(params)
            .send()
            .map_err(|source| CrmError::Http {
                method: method.to_string(),
                source,
            })?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|source| CrmError::Http {
            method: method.to_string(),
            source,
        })?;

        parse_response(method, status, &body)
    }

    /// Call a list method and follow `next` until every page is read
    pub fn call_list(&self, method: &str, params: &Value) -> CrmResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut start: Option<u64> = None;

        loop {
            let mut body = match params {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            if let Some(start) = start {
                body.insert("start".into(), Value::from(start));
            }

            let envelope = self.call(method, &Value::Object(body))?;
            let next = envelope.next;
            let total = envelope.total;
            items.extend(envelope.into_items());
            tracing::debug!(method, fetched = items.len(), ?total, "page read");

            match next {
                Some(n) if start.map_or(true, |s| n > s) => start = Some(n),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Trim the webhook URL and make sure it ends with `/`.
fn normalize_base(webhook_url: &str) -> CrmResult<String> {
    let url = webhook_url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(CrmError::Config(format!(
            "webhook URL must start with http:// or https://, got '{}'",
            url
        )));
    }
    if url.ends_with('/') {
        Ok(url.to_string())
    } else {
        Ok(format!("{}/", url))
    }
}

/// Hide the webhook secret (`/rest/<user>/<secret>/`) in log output.
fn redact(url: &str) -> String {
    match url.find("/rest/") {
        Some(pos) => {
            let (portal, rest) = url.split_at(pos + "/rest/".len());
            let mut parts: Vec<&str> = rest.split('/').collect();
            if parts.len() > 2 {
                parts[1] = "***";
            }
            format!("{}{}", portal, parts.join("/"))
        }
        None => url.to_string(),
    }
}

/// Turn a status code and body into an envelope or an error.
pub(crate) fn parse_response(method: &str, status: u16, body: &str) -> CrmResult<Envelope> {
    let parsed = serde_json::from_str::<Envelope>(body);

    if !(200..300).contains(&status) {
        let message = match &parsed {
            Ok(Envelope {
                error: Some(code),
                error_description,
                ..
            }) => match error_description {
                Some(description) if !description.is_empty() => {
                    format!("{}: {}", code, description)
                }
                _ => code.clone(),
            },
            _ => body.chars().take(MAX_ERROR_BODY).collect(),
        };
        return Err(CrmError::Status {
            method: method.to_string(),
            status,
            message,
        });
    }

    let envelope = parsed.map_err(|source| CrmError::Decode {
        method: method.to_string(),
        source,
    })?;
    if let Some(code) = &envelope.error {
        return Err(CrmError::Api {
            method: method.to_string(),
            code: code.clone(),
            description: envelope.error_description.clone().unwrap_or_default(),
        });
    }
    Ok(envelope)
}

/// Link to a deal card in the portal the webhook belongs to.
///
/// `https://portal.bitrix24.ru/rest/1/abc/` and deal 25034 give
/// `https://portal.bitrix24.ru/crm/deal/details/25034/`.
pub fn deal_link(webhook_url: &str, deal_id: u64) -> Option<String> {
    let url = webhook_url.trim();
    let scheme_end = url.find("://")? + 3;
    let portal = match url.find("/rest") {
        Some(pos) => &url[..pos],
        None => {
            let host_end = url[scheme_end..]
                .find('/')
                .map_or(url.len(), |i| scheme_end + i);
            &url[..host_end]
        }
    };
    if portal.len() <= scheme_end {
        return None;
    }
    Some(format!("{}/crm/deal/details/{}/", portal, deal_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let envelope = parse_response(
            "crm.deal.productrows.get",
            200,
            r#"{"result":[{"ID":"1","PRODUCT_ID":1036}],"time":{"start":1}}"#,
        )
        .unwrap();
        assert_eq!(envelope.result, json!([{"ID": "1", "PRODUCT_ID": 1036}]));
        assert_eq!(envelope.next, None);
    }

    #[test]
    fn test_parse_api_error() {
        let err = parse_response(
            "crm.deal.get",
            200,
            r#"{"error":"NOT_FOUND","error_description":"Not found"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CrmError::Api { ref code, .. } if code == "NOT_FOUND"));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_parse_status_error() {
        let err = parse_response(
            "crm.product.get",
            400,
            r#"{"error":"ERROR_CORE","error_description":"Product is not found"}"#,
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "crm.product.get returned HTTP 400: ERROR_CORE: Product is not found"
        );

        let err = parse_response("crm.deal.get", 502, "<html>Bad gateway</html>").unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().ends_with("<html>Bad gateway</html>"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_response("crm.deal.get", 200, "not json").unwrap_err();
        assert!(matches!(err, CrmError::Decode { .. }));
    }

    #[test]
    fn test_list_items() {
        let array = Envelope {
            result: json!([1, 2]),
            ..Default::default()
        };
        assert_eq!(array.into_items(), vec![json!(1), json!(2)]);

        let wrapped = Envelope {
            result: json!({"prices": [{"id": 1}]}),
            ..Default::default()
        };
        assert_eq!(wrapped.into_items(), vec![json!({"id": 1})]);

        assert!(Envelope::default().into_items().is_empty());
    }

    #[test]
    fn test_client_urls() {
        let client = WebhookClient::new(" https://portal.example.com/rest/1/secret ").unwrap();
        assert_eq!(client.base_url(), "https://portal.example.com/rest/1/secret/");
        assert_eq!(
            client.method_url("crm.deal.get"),
            "https://portal.example.com/rest/1/secret/crm.deal.get"
        );
        assert!(WebhookClient::new("portal.example.com/rest/1/x/").is_err());
    }

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("https://portal.example.com/rest/6808/secret/crm.deal.get"),
            "https://portal.example.com/rest/6808/***/crm.deal.get"
        );
    }

    #[test]
    fn test_deal_link() {
        assert_eq!(
            deal_link("https://portal.bitrix24.ru/rest/6808/abc/", 25034).as_deref(),
            Some("https://portal.bitrix24.ru/crm/deal/details/25034/")
        );
        assert_eq!(
            deal_link("https://crm.example.com", 7).as_deref(),
            Some("https://crm.example.com/crm/deal/details/7/")
        );
        assert_eq!(deal_link("", 7), None);
    }
}
