//! Connector tests: search, cancellation, dependent filters and detail retrieval

use std::sync::Arc;
use std::time::Duration;

use metadata_connector::{
    AdapterKind, Connector, ConnectorConfig, ConnectorError, ConnectorRegistry, FilterField,
    FilterOption, MetadataSetConfig, Query, ScriptedTransport, SortDirection, TransportError,
    ValidationError,
};
use serde_json::json;

fn reference_indicators() -> MetadataSetConfig {
    MetadataSetConfig::new(
        "reference-indicators",
        "https://api.staging.openconceptlab.org",
        AdapterKind::Ocl,
    )
    .with_name("MER Reference Indicators")
    .with_organization("PEPFAR-Test7")
    .with_source("MER")
    .with_concept_class("Reference Indicator")
    .with_resource_type("reference_indicator")
    .with_field(FilterField::categorical("indicator_group", ["Treatment", "Testing"]))
    .with_field(
        FilterField::categorical("indicator", Vec::<String>::new())
            .with_depends_on("indicator_group")
            .with_option(FilterOption::new("TX_CURR").requires("indicator_group", ["Treatment"]))
            .with_option(FilterOption::new("TX_NEW").requires("indicator_group", ["Treatment"]))
            .with_option(FilterOption::new("HTS_TST").requires("indicator_group", ["Testing"])),
    )
}

fn data_elements() -> MetadataSetConfig {
    MetadataSetConfig::new("dhis2-data-elements", "https://play.dhis2.org/40", AdapterKind::Dhis2)
        .with_resource_type("data_element")
        .with_field(FilterField::categorical("value_type", ["NUMBER", "INTEGER", "TEXT"]))
        .with_sort_field("code")
}

fn connector(config: MetadataSetConfig, transport: Arc<ScriptedTransport>) -> Connector {
    Connector::from_config(config, transport).unwrap()
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_source_is_transport_empty() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!([]));

        let err = connector(reference_indicators(), transport.clone())
            .search(&Query::new("reference-indicators").with_page(1).with_page_size(10))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::Transport(TransportError::Empty(_))));
        let request = &transport.requests()[0];
        assert_eq!(request.param("limit"), Some("10"));
        assert_eq!(request.param("page"), Some("1"));
    }

    #[tokio::test]
    async fn test_filters_and_search_reach_source() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!([{"id": "TX_CURR", "display_name": "TX_CURR"}]));

        let query = Query::new("reference-indicators")
            .with_filter("indicator_group", "Treatment")
            .with_filter("indicator", "TX_CURR")
            .with_filter("indicator", "TX_NEW")
            .with_search("  TX_ ")
            .with_sort("display_name", SortDirection::Desc);
        let page = connector(reference_indicators(), transport.clone())
            .search(&query)
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert!(!page.has_more());
        let request = &transport.requests()[0];
        assert_eq!(request.param("q"), Some("TX_"));
        assert_eq!(request.param("extras.indicator"), Some("TX_CURR,TX_NEW"));
        assert_eq!(request.param("extras.indicator_group"), Some("Treatment"));
        assert_eq!(request.param("conceptClass"), Some("\"Reference Indicator\""));
        assert!(request.param("sortDesc").is_some());
    }

    #[tokio::test]
    async fn test_unknown_field_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = connector(reference_indicators(), transport.clone())
            .search(&Query::new("reference-indicators").with_filter("age_band", "15-19"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Validation(ValidationError::UnknownField { ref field, .. }) if field == "age_band"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_option_outside_dependent_selection_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = connector(reference_indicators(), transport.clone())
            .search(
                &Query::new("reference-indicators")
                    .with_filter("indicator_group", "Testing")
                    .with_filter("indicator", "TX_CURR"),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Validation(ValidationError::InvalidOption { ref field, ref value })
                if field == "indicator" && value == "TX_CURR"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_page_size_above_maximum_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = connector(reference_indicators().with_max_page_size(50), transport.clone())
            .search(&Query::new("reference-indicators").with_page_size(51))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Validation(ValidationError::InvalidPaging { max_page_size: 50, .. })
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(TransportError::http(503, "maintenance")));

        let err = connector(reference_indicators(), transport)
            .search(&Query::new("reference-indicators"))
            .await
            .unwrap_err();

        assert_eq!(err.transport_error().and_then(|e| e.status()), Some(503));
    }

    #[tokio::test]
    async fn test_dhis2_paging_reports_total() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    "page=2",
                    Ok(json!({
                        "pager": {"page": 2, "pageSize": 50, "total": 120},
                        "dataElements": [{"id": "fbfJHSPpUQD", "displayName": "ANC 1st visit"}]
                    })),
                )
                .route(
                    "page=3",
                    Ok(json!({
                        "pager": {"page": 3, "pageSize": 50, "total": 120},
                        "dataElements": [{"id": "cYeuwXTCPkU", "displayName": "ANC 2nd visit"}]
                    })),
                ),
        );
        let connector = connector(data_elements(), transport.clone());

        let second = connector
            .search(
                &Query::new("dhis2-data-elements")
                    .with_page(2)
                    .with_page_size(50)
                    .with_filter("value_type", "NUMBER")
                    .with_filter("value_type", "INTEGER")
                    .with_sort("code", SortDirection::Asc),
            )
            .await
            .unwrap();
        assert_eq!(second.total_count(), Some(120));
        assert!(second.has_more());

        let third = connector
            .search(&Query::new("dhis2-data-elements").with_page(3).with_page_size(50))
            .await
            .unwrap();
        assert!(!third.has_more());

        let request = &transport.requests()[0];
        assert_eq!(request.param("paging"), Some("true"));
        assert_eq!(request.param("pageSize"), Some("50"));
        assert_eq!(request.params("filter"), vec!["valueType:in:[NUMBER,INTEGER]"]);
        assert_eq!(request.param("order"), Some("code:asc"));
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_canceled_search_leaves_second_untouched() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_latency(Duration::from_millis(200))
                .route("limit=10", Ok(json!([{"id": "FIRST"}])))
                .route(
                    "limit=25",
                    Ok(json!([{"id": "TX_CURR"}, {"id": "TX_NEW"}, {"id": "HTS_TST"}])),
                ),
        );
        let connector = connector(reference_indicators(), transport.clone());
        let selections = Query::new("reference-indicators")
            .with_filter("indicator_group", "Treatment")
            .selections();
        let filters_before = connector.metadata_set().available_filters(&selections);

        let first = connector.spawn_search(Query::new("reference-indicators").with_page_size(10));
        let second = connector.spawn_search(Query::new("reference-indicators").with_page_size(25));
        first.cancel();

        assert!(matches!(first.join().await, Err(ConnectorError::Canceled)));
        let page = second.join().await.unwrap();
        assert_eq!(page.page_size(), 25);
        assert_eq!(page.len(), 3);
        assert_eq!(page.records()[0].id, "TX_CURR");

        assert_eq!(connector.metadata_set().available_filters(&selections), filters_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_request() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_latency(Duration::from_secs(30))
                .route("limit=25", Ok(json!([{"id": "TX_CURR"}]))),
        );
        let connector = connector(reference_indicators(), transport.clone());
        let token = metadata_connector::CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = connector
            .search_with_cancel(&Query::new("reference-indicators"), &token)
            .await;
        assert!(matches!(result, Err(ConnectorError::Canceled)));

        // Well past the scripted latency: a request left running would have finished
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.completed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_with_cancel_before_start() {
        let transport = Arc::new(ScriptedTransport::new());
        let token = metadata_connector::CancellationToken::new();
        token.cancel();

        let result = connector(reference_indicators(), transport.clone())
            .search_with_cancel(&Query::new("reference-indicators"), &token)
            .await;
        assert!(matches!(result, Err(ConnectorError::Canceled)));
        assert_eq!(transport.call_count(), 0);
    }
}

mod filter_tests {
    use super::*;

    #[test]
    fn test_available_filters_is_deterministic() {
        let connector = connector(reference_indicators(), Arc::new(ScriptedTransport::new()));
        let set = connector.metadata_set();
        let selections = Query::new("reference-indicators")
            .with_filter("indicator_group", "Testing")
            .selections();

        let first = set.available_filters(&selections);
        let second = set.available_filters(&selections);
        assert_eq!(first, second);

        let indicator: Vec<&str> = first["indicator"]
            .options
            .iter()
            .map(|option| option.value.as_str())
            .collect();
        assert_eq!(indicator, vec!["HTS_TST"]);

        // Nothing selected: every option stays available
        let all = set.available_filters(&Default::default());
        assert_eq!(all["indicator"].options.len(), 3);
    }
}

mod resource_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_resource_round_trip() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    "/concepts/TX_CURR/",
                    Ok(json!({
                        "id": "TX_CURR",
                        "display_name": "TX_CURR",
                        "concept_class": "Reference Indicator",
                        "descriptions": [{"description": "Number of adults and children currently receiving ART"}],
                        "url": "/orgs/PEPFAR-Test7/sources/MER/concepts/TX_CURR/"
                    })),
                )
                .route("/concepts/", Ok(json!([{"id": "TX_CURR", "display_name": "TX_CURR"}]))),
        );
        let connector = connector(reference_indicators(), transport.clone());

        let page = connector
            .search(&Query::new("reference-indicators"))
            .await
            .unwrap();
        let summary = &page.records()[0];
        let detail = connector.get_resource(&summary.source_ref).await.unwrap();

        assert_eq!(detail.id, summary.id);
        assert_eq!(detail.resource_type, summary.resource_type);
        assert_eq!(
            detail.attribute_text("description").as_deref(),
            Some("Number of adults and children currently receiving ART")
        );
        assert_eq!(transport.requests()[1].param("verbose"), Some("true"));
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(TransportError::http(404, "Not found")));

        let err = connector(data_elements(), transport.clone())
            .get_resource_by_id("doesNotExist")
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::NotFound(ref e) if e.id == "doesNotExist"));
        assert!(transport.requests()[0].url.ends_with("/api/dataElements/doesNotExist.json"));
    }

    #[tokio::test]
    async fn test_foreign_reference_is_not_found() {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = connector(data_elements(), transport.clone());
        let foreign = metadata_connector::SourceRef::new("reference-indicators", "TX_CURR");

        assert!(matches!(
            connector.get_resource(&foreign).await,
            Err(ConnectorError::NotFound(_))
        ));
        assert_eq!(transport.call_count(), 0);
    }
}

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_routes_queries() {
        let config = ConnectorConfig::default()
            .with_metadata_set(reference_indicators())
            .with_metadata_set(data_elements());
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    "dataElements.json",
                    Ok(json!({"pager": {"total": 1}, "dataElements": [{"id": "fbfJHSPpUQD"}]})),
                )
                .route("/concepts/", Ok(json!([{"id": "TX_CURR"}]))),
        );
        let registry = ConnectorRegistry::from_config(&config, transport.clone())
            .unwrap()
            .with_headers(vec![("Authorization".to_string(), "Token abc".to_string())]);

        let page = registry.search(&Query::new("dhis2-data-elements")).await.unwrap();
        assert_eq!(page.records()[0].id, "fbfJHSPpUQD");
        assert_eq!(page.records()[0].source_ref.metadata_set_id, "dhis2-data-elements");

        let page = registry.search(&Query::new("reference-indicators")).await.unwrap();
        assert_eq!(page.records()[0].id, "TX_CURR");

        assert!(transport
            .requests()
            .iter()
            .all(|request| request.has_header("Authorization")));
        assert!(matches!(
            registry.search(&Query::new("mappings")).await,
            Err(ConnectorError::UnknownMetadataSet(_))
        ));
    }
}

mod http_transport_tests {
    use super::*;
    use metadata_connector::{HttpTransport, TransportConfig};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned HTTP responses, one per connection, recording request heads
    async fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                log.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{address}"), received)
    }

    fn response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn http_connector(base_url: &str) -> Connector {
        let transport = HttpTransport::new(
            TransportConfig::default()
                .with_timeout(5)
                .with_max_retries(2)
                .with_backoff_base_ms(1),
        )
        .unwrap();
        let config = MetadataSetConfig::new("dhis2-data-elements", base_url, AdapterKind::Dhis2);
        Connector::from_config(config, Arc::new(transport)).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let (base_url, _) = serve(vec![response(
            "200 OK",
            "text/html",
            "<html><body>Login required</body></html>",
        )])
        .await;

        let err = http_connector(&base_url)
            .search(&Query::new("dhis2-data-elements"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Transport(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let body = r#"{"pager":{"total":1},"dataElements":[{"id":"fbfJHSPpUQD","displayName":"ANC 1st visit"}]}"#;
        let (base_url, received) = serve(vec![
            response("503 Service Unavailable", "text/plain", "busy"),
            response("200 OK", "application/json", body),
        ])
        .await;

        let page = http_connector(&base_url)
            .with_headers(vec![("Authorization".to_string(), "ApiToken d2pat_x".to_string())])
            .search(&Query::new("dhis2-data-elements"))
            .await
            .unwrap();
        assert_eq!(page.records()[0].display_name, "ANC 1st visit");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        let head = received[1].to_ascii_lowercase();
        assert!(head.starts_with("get /api/dataelements.json?"));
        assert!(head.contains("accept: application/json"));
        assert!(head.contains("authorization: apitoken d2pat_x"));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base_url, received) = serve(vec![response("401 Unauthorized", "text/plain", "denied")]).await;

        let err = http_connector(&base_url)
            .search(&Query::new("dhis2-data-elements"))
            .await
            .unwrap_err();
        assert_eq!(err.transport_error().and_then(|e| e.status()), Some(401));
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
