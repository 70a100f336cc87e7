//! Export tests: formats, restrictions and detail resolution through the connector

use std::sync::Arc;
use std::time::Duration;

use metadata_connector::{
    AdapterKind, CancellationToken, Connector, ExportEngine, ExportError, ExportFormat,
    ExportSelection, MetadataSetConfig, Query, Record, ScriptedTransport,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

fn data_elements() -> MetadataSetConfig {
    MetadataSetConfig::new("dhis2-data-elements", "https://play.dhis2.org/40", AdapterKind::Dhis2)
        .with_resource_type("data_element")
        .with_export_formats(
            "data_element",
            [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Yaml, ExportFormat::Markdown],
        )
}

fn transport() -> Arc<ScriptedTransport> {
    Arc::new(
        ScriptedTransport::new()
            .route(
                "dataElements/fbfJHSPpUQD.json",
                Ok(json!({
                    "id": "fbfJHSPpUQD",
                    "displayName": "ANC 1st visit",
                    "code": "DE_359596",
                    "valueType": "NUMBER",
                    "dataElementGroups": [{"id": "qfxEYY9xAl6", "displayName": "ANC"}]
                })),
            )
            .route(
                "dataElements/cYeuwXTCPkU.json",
                Ok(json!({
                    "id": "cYeuwXTCPkU",
                    "displayName": "ANC 2nd visit, \"follow-up\"",
                    "code": "DE_359597",
                    "valueType": "NUMBER"
                })),
            )
            .route(
                "dataElements.json",
                Ok(json!({
                    "pager": {"total": 2},
                    "dataElements": [
                        {"id": "fbfJHSPpUQD", "displayName": "ANC 1st visit"},
                        {"id": "cYeuwXTCPkU", "displayName": "ANC 2nd visit"}
                    ]
                })),
            ),
    )
}

async fn search_records(connector: &Connector) -> Vec<Record> {
    connector
        .search(&Query::new("dhis2-data-elements"))
        .await
        .unwrap()
        .into_records()
}

mod format_tests {
    use super::*;

    #[tokio::test]
    async fn test_csv_set_export_uses_detail() {
        let transport = transport();
        let connector = Connector::from_config(data_elements(), transport.clone()).unwrap();
        let records = search_records(&connector).await;

        let artifact = connector
            .export(records.into(), ExportFormat::Csv)
            .await
            .unwrap();

        assert_eq!(artifact.mime_type, "text/csv");
        assert_eq!(artifact.record_count, 2);
        assert!(artifact.file_name.starts_with("data_element-export-"));
        assert!(artifact.file_name.ends_with(".csv"));

        let text = artifact.as_text().unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "id,display_name,resource_type,code,groups,value_type");
        assert_eq!(lines[1], "fbfJHSPpUQD,ANC 1st visit,data_element,DE_359596,ANC,NUMBER");
        assert_eq!(
            lines[2],
            "cYeuwXTCPkU,\"ANC 2nd visit, \"\"follow-up\"\"\",data_element,DE_359597,,NUMBER"
        );

        // one search, then one detail request per record
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_json_single_export() {
        let connector = Connector::from_config(data_elements(), transport()).unwrap();
        let record = search_records(&connector).await.remove(0);

        let artifact = connector
            .export(ExportSelection::Single(record), ExportFormat::Json)
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "fbfJHSPpUQD.json");
        assert_eq!(artifact.mime_type, "application/json");
        let value: Value = serde_json::from_slice(&artifact.payload).unwrap();
        assert_eq!(value["id"], "fbfJHSPpUQD");
        assert_eq!(value["attributes"]["code"], "DE_359596");
        assert_eq!(artifact.checksum, format!("{:x}", Sha256::digest(&artifact.payload)));
    }

    #[tokio::test]
    async fn test_yaml_export_parses_back() {
        let connector = Connector::from_config(data_elements(), transport()).unwrap();
        let records = search_records(&connector).await;

        let artifact = connector
            .export(records.into(), ExportFormat::Yaml)
            .await
            .unwrap();

        assert!(artifact.file_name.ends_with(".yaml"));
        let parsed: Vec<Record> = serde_yaml::from_slice(&artifact.payload).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].id, "cYeuwXTCPkU");
        assert_eq!(parsed[1].source_ref.metadata_set_id, "dhis2-data-elements");
    }

    #[tokio::test]
    async fn test_markdown_without_detail_resolution() {
        let transport = transport();
        let connector = Connector::from_config(data_elements(), transport.clone())
            .unwrap()
            .with_export_engine(ExportEngine::new().with_resolve_details(false));
        let records = search_records(&connector).await;

        let artifact = connector
            .export(records.into(), ExportFormat::Markdown)
            .await
            .unwrap();

        let text = artifact.as_text().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "| id | display_name | resource_type |");
        assert_eq!(lines[1], "| --- | --- | --- |");
        assert_eq!(lines[2], "| fbfJHSPpUQD | ANC 1st visit | data_element |");
        assert!(artifact.file_name.ends_with(".md"));
        assert_eq!(transport.call_count(), 1);
    }
}

mod restriction_tests {
    use super::*;

    #[tokio::test]
    async fn test_undeclared_format_rejected_before_any_request() {
        let transport = transport();
        let config = MetadataSetConfig::new(
            "dhis2-data-elements",
            "https://play.dhis2.org/40",
            AdapterKind::Dhis2,
        )
        .with_resource_type("data_element")
        .with_export_formats("data_element", [ExportFormat::Json]);
        let connector = Connector::from_config(config, transport.clone()).unwrap();
        let record = connector
            .metadata_set()
            .adapter()
            .parse_record(&json!({"id": "fbfJHSPpUQD", "displayName": "ANC 1st visit"}))
            .unwrap();

        let err = connector
            .export(record.into(), ExportFormat::Csv)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnsupportedFormat { format: ExportFormat::Csv, ref resource_type }
                if resource_type == "data_element"
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_selection_rejected() {
        let connector = Connector::from_config(data_elements(), transport()).unwrap();
        let err = connector
            .export(ExportSelection::Set(Vec::new()), ExportFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));
    }

    #[tokio::test]
    async fn test_mixed_resource_types_rejected() {
        let config = data_elements().with_export_formats("indicator", [ExportFormat::Json]);
        let connector = Connector::from_config(config, transport()).unwrap();
        let mut records = search_records(&connector).await;
        records[1].resource_type = "indicator".into();

        assert_eq!(
            connector.export_formats_for(&ExportSelection::Set(records.clone())),
            [ExportFormat::Json].into_iter().collect()
        );
        let err = connector
            .export(records.into(), ExportFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::MixedResourceTypes(types) if types.len() == 2));
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_fails_export() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "dataElements/",
            Err(metadata_connector::TransportError::http(404, "Not found")),
        ));
        let connector = Connector::from_config(data_elements(), transport).unwrap();
        let record = connector
            .metadata_set()
            .adapter()
            .parse_record(&json!({"id": "removed01", "displayName": "Removed"}))
            .unwrap();

        let err = connector
            .export(record.into(), ExportFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Fetch { ref id, .. } if id == "removed01"));
        assert!(err.is_generation_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_cancel() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_latency(Duration::from_secs(30))
                .route("dataElements/", Ok(json!({"id": "fbfJHSPpUQD"}))),
        );
        let connector = Connector::from_config(data_elements(), transport.clone()).unwrap();
        let record = connector
            .metadata_set()
            .adapter()
            .parse_record(&json!({"id": "fbfJHSPpUQD"}))
            .unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = connector
            .export_with_cancel(record.into(), ExportFormat::Json, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Canceled));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.completed_count(), 0);
    }
}
