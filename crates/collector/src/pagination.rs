//! Page-number pagination over collection endpoints

use crate::client::{GithubClient, Query};
use crate::Result;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

pub const PER_PAGE: u32 = 100;

impl GithubClient {
    /// Fetch every page of a collection endpoint, in request order
    ///
    /// Stops at the first page without records. Total-count fields are
    /// ignored since not every endpoint sends them.
    pub async fn collect(&self, url: &str, base_query: &Query) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let query = page_query(base_query, page);
            let body = self.request(Method::GET, url, &query).await?;
            let items = extract_items(body);

            if items.is_empty() {
                break;
            }

            debug!(url = url, page = page, count = items.len(), "Fetched page");
            records.extend(items);
            page += 1;
        }

        Ok(records)
    }
}

/// Base parameters with `per_page`/`page` merged in, overriding any given values
fn page_query(base_query: &Query, page: u32) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = base_query
        .iter()
        .filter(|(k, _)| k != "per_page" && k != "page")
        .cloned()
        .collect();
    query.push(("per_page".to_string(), PER_PAGE.to_string()));
    query.push(("page".to_string(), page.to_string()));
    query
}

/// Records of one page: a bare array, or the `items` array of an object
pub fn extract_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::CollectorConfig;
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "https://api.test/orgs/acme/repos";

    fn page_url(page: u32) -> String {
        format!("{}?type=all&per_page=100&page={}", BASE, page)
    }

    fn client(transport: &MockTransport) -> GithubClient {
        let config = CollectorConfig {
            api_url: "https://api.test".to_string(),
            ..CollectorConfig::default()
        };
        GithubClient::with_transport(Arc::new(transport.clone()), &config)
    }

    fn base_query() -> Vec<(String, String)> {
        vec![("type".to_string(), "all".to_string())]
    }

    #[test]
    fn extracts_arrays_and_search_items() {
        assert_eq!(extract_items(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(
            extract_items(json!({"total_count": 1, "items": [{"id": 3}]})),
            vec![json!({"id": 3})]
        );
        assert!(extract_items(json!({"message": "no items"})).is_empty());
        assert!(extract_items(json!({"items": "oops"})).is_empty());
        assert!(extract_items(Value::Null).is_empty());
    }

    #[test]
    fn page_parameters_override_base_values() {
        let base = vec![
            ("per_page".to_string(), "5".to_string()),
            ("state".to_string(), "all".to_string()),
        ];
        assert_eq!(
            page_query(&base, 3),
            vec![
                ("state".to_string(), "all".to_string()),
                ("per_page".to_string(), "100".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn stops_on_empty_page_after_full_page() {
        let transport = MockTransport::new();
        let full: Vec<_> = (0..100).map(|i| json!({"id": i})).collect();
        let partial: Vec<_> = (100..130).map(|i| json!({"id": i})).collect();
        transport.push_json(page_url(1), 200, json!(full));
        transport.push_json(page_url(2), 200, json!(partial));
        transport.push_json(page_url(3), 200, json!([]));

        let records = client(&transport).collect(BASE, &base_query()).await.unwrap();

        assert_eq!(records.len(), 130);
        assert_eq!(records[0], json!({"id": 0}));
        assert_eq!(records[129], json!({"id": 129}));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn exactly_full_final_page_terminates_on_next_empty_page() {
        let transport = MockTransport::new();
        let full: Vec<_> = (0..100).map(|i| json!({"id": i})).collect();
        transport.push_json(page_url(1), 200, json!(full));
        transport.push_json(page_url(2), 200, json!([]));

        let records = client(&transport).collect(BASE, &base_query()).await.unwrap();

        assert_eq!(records.len(), 100);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn long_histories_are_read_to_the_last_page() {
        let transport = MockTransport::new();
        for page in 1..=1001 {
            transport.push_json(page_url(page), 200, json!([{"id": page}]));
        }
        transport.push_json(page_url(1002), 200, json!([]));

        let records = client(&transport).collect(BASE, &base_query()).await.unwrap();

        assert_eq!(records.len(), 1001);
        assert_eq!(records[1000], json!({"id": 1001}));
    }

    #[tokio::test]
    async fn object_pages_use_items_field() {
        let transport = MockTransport::new();
        transport.push_json(
            page_url(1),
            200,
            json!({"total_count": 999, "items": [{"id": 1}]}),
        );
        transport.push_json(page_url(2), 200, json!({"total_count": 999}));

        let records = client(&transport).collect(BASE, &base_query()).await.unwrap();
        assert_eq!(records, vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn page_error_propagates() {
        let transport = MockTransport::new();
        transport.push_json(page_url(1), 200, json!([{"id": 1}]));
        transport.push_json(page_url(2), 410, json!({"message": "Gone"}));

        let err = client(&transport)
            .collect(BASE, &base_query())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::CollectorError::Status { status: 410, .. }
        ));
    }
}
