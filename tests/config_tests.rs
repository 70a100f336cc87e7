//! Configuration loading tests

use std::fs;
use std::sync::Arc;

use metadata_connector::{
    AdapterKind, ConfigError, ConnectorConfig, ConnectorRegistry, ExportFormat, FilterKind, Query,
    ResourceType, ScriptedTransport,
};
use tempfile::TempDir;

const TOML_CONFIG: &str = r#"
[transport]
timeout_seconds = 10
max_retries = 1
user_agent = "metadata-cli/0.3"

[[metadata_sets]]
id = "reference-indicators"
name = "MER Reference Indicators"
base_url = "https://api.staging.openconceptlab.org"
adapter = "ocl"
organization = "PEPFAR-Test7"
source = "MER"
concept_class = "Reference Indicator"
resource_type = "reference_indicator"
search_autocomplete = true

[[metadata_sets.fields]]
name = "indicator_group"
kind = "categorical"
options = ["Treatment", "Testing"]

[[metadata_sets.fields]]
name = "indicator"
kind = "categorical"
depends_on = ["indicator_group"]
autocomplete = true
options = [
    { value = "TX_CURR", label = "Currently on ART", requires = { indicator_group = ["Treatment"] } },
    { value = "HTS_TST", requires = { indicator_group = ["Testing"] } },
]

[metadata_sets.export_formats]
reference_indicator = ["json", "csv", "markdown"]

[[metadata_sets]]
id = "dhis2-data-elements"
base_url = "https://play.dhis2.org/40"
adapter = "dhis2"
resource_type = "data_element"
max_page_size = 50

[[metadata_sets.fields]]
name = "value_type"
kind = "categorical"
options = ["NUMBER", "INTEGER", "TEXT"]

[[metadata_sets.fields]]
name = "zero_is_significant"
kind = "boolean"
source_name = "zeroIsSignificant"

[metadata_sets.export_formats]
data_element = ["json", "yaml"]
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

mod load_tests {
    use super::*;

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let config = ConnectorConfig::load(write(&dir, "connector.toml", TOML_CONFIG)).unwrap();

        assert_eq!(config.transport.timeout_seconds, 10);
        assert_eq!(config.transport.max_retries, 1);
        assert_eq!(config.transport.backoff_base_ms, 200);
        assert_eq!(config.metadata_sets.len(), 2);

        let indicators = config.metadata_set("reference-indicators").unwrap();
        assert_eq!(indicators.adapter, AdapterKind::Ocl);
        assert_eq!(indicators.max_page_size, 100);
        assert_eq!(indicators.fields[1].options[0].label.as_deref(), Some("Currently on ART"));
        assert_eq!(
            indicators.export_formats["reference_indicator"],
            vec![ExportFormat::Json, ExportFormat::Csv, ExportFormat::Markdown]
        );

        let elements = config.metadata_set("dhis2-data-elements").unwrap();
        assert_eq!(elements.display_name(), "dhis2-data-elements");
        assert_eq!(elements.max_page_size, 50);
        assert_eq!(elements.fields[1].kind, FilterKind::Boolean);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{
            "metadata_sets": [{
                "id": "dhis2-data-elements",
                "base_url": "https://play.dhis2.org/40/api",
                "adapter": "dhis2",
                "resource_type": "data_element",
                "fields": [{"name": "coverage", "kind": "range", "range": {"min": 0.0, "max": 100.0}}],
                "export_formats": {"data_element": ["csv"]}
            }]
        }"#;
        let dir = TempDir::new().unwrap();
        let config = ConnectorConfig::load(write(&dir, "connector.json", json)).unwrap();

        assert_eq!(config.transport.timeout_seconds, 30);
        let set = &config.metadata_sets[0];
        assert_eq!(set.fields[0].range.map(|r| r.max), Some(100.0));
        assert_eq!(set.sort_fields, vec!["display_name"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ConnectorConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let err = ConnectorConfig::load(write(&dir, "connector.yaml", "metadata_sets: []")).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedExtension("yaml".to_string()));
    }

    #[test]
    fn test_malformed_toml() {
        let err = ConnectorConfig::from_toml_str("[[metadata_sets]\nid = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_adapter() {
        let toml = r#"
            [[metadata_sets]]
            id = "catalog"
            base_url = "https://example.org"
            adapter = "ckan"
        "#;
        assert!(matches!(
            ConnectorConfig::from_toml_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_duplicate_set_ids() {
        let toml = r#"
            [[metadata_sets]]
            id = "catalog"
            base_url = "https://play.dhis2.org/40"
            adapter = "dhis2"

            [[metadata_sets]]
            id = "catalog"
            base_url = "https://play.dhis2.org/41"
            adapter = "dhis2"
        "#;
        assert_eq!(
            ConnectorConfig::from_toml_str(toml).unwrap_err(),
            ConfigError::DuplicateSet("catalog".to_string())
        );
    }

    #[test]
    fn test_invalid_set_id() {
        let toml = r#"
            [[metadata_sets]]
            id = "reference indicators"
            base_url = "https://play.dhis2.org/40"
            adapter = "dhis2"
        "#;
        assert!(matches!(
            ConnectorConfig::from_toml_str(toml),
            Err(ConfigError::Invalid { set, .. }) if set == "reference indicators"
        ));
    }

    #[test]
    fn test_dependency_cycle() {
        let toml = r#"
            [[metadata_sets]]
            id = "catalog"
            base_url = "https://play.dhis2.org/40"
            adapter = "dhis2"

            [[metadata_sets.fields]]
            name = "group"
            kind = "categorical"
            depends_on = ["element"]

            [[metadata_sets.fields]]
            name = "element"
            kind = "categorical"
            depends_on = ["group"]
        "#;
        match ConnectorConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid { message, .. }) => assert!(message.contains("cycle")),
            other => panic!("expected a cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_requires_outside_depends_on() {
        let toml = r#"
            [[metadata_sets]]
            id = "catalog"
            base_url = "https://play.dhis2.org/40"
            adapter = "dhis2"

            [[metadata_sets.fields]]
            name = "group"
            kind = "categorical"
            options = ["ANC"]

            [[metadata_sets.fields]]
            name = "element"
            kind = "categorical"
            options = [{ value = "ANC 1st visit", requires = { group = ["ANC"] } }]
        "#;
        match ConnectorConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid { message, .. }) => {
                assert!(message.contains("not in depends_on"))
            }
            other => panic!("expected an invalid option, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_bounds() {
        let zero_timeout = "[transport]\ntimeout_seconds = 0";
        assert!(matches!(
            ConnectorConfig::from_toml_str(zero_timeout),
            Err(ConfigError::InvalidTransport(message)) if message.contains("timeout_seconds")
        ));

        let huge_budget = "[transport]\ntimeout_seconds = 10\nmax_retries = 4000000000";
        assert!(matches!(
            ConnectorConfig::from_toml_str(huge_budget),
            Err(ConfigError::InvalidTransport(message)) if message.contains("max_retries")
        ));

        let json = r#"{"transport": {"max_retries": 5}}"#;
        assert_eq!(ConnectorConfig::from_json_str(json).unwrap().transport.max_retries, 5);
    }

    #[test]
    fn test_ocl_set_needs_source_identifiers() {
        let toml = r#"
            [[metadata_sets]]
            id = "reference-indicators"
            base_url = "https://api.openconceptlab.org"
            adapter = "ocl"
        "#;
        let config = ConnectorConfig::from_toml_str(toml).unwrap();
        let err = ConnectorRegistry::from_config(&config, Arc::new(ScriptedTransport::new()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_ocl_set_rejects_range_fields() {
        let toml = r#"
            [[metadata_sets]]
            id = "reference-indicators"
            base_url = "https://api.openconceptlab.org"
            adapter = "ocl"
            organization = "PEPFAR-Test7"
            source = "MER"

            [[metadata_sets.fields]]
            name = "fiscal_year"
            kind = "range"
            range = { min = 2015.0, max = 2030.0 }
        "#;
        let config = ConnectorConfig::from_toml_str(toml).unwrap();
        match ConnectorRegistry::from_config(&config, Arc::new(ScriptedTransport::new())) {
            Err(ConfigError::Invalid { message, .. }) => assert!(message.contains("fiscal_year")),
            other => panic!("expected an invalid set, got {:?}", other.map(|r| r.len())),
        }
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn test_registry_from_loaded_config() {
        let config = ConnectorConfig::from_toml_str(TOML_CONFIG).unwrap();
        let registry =
            ConnectorRegistry::from_config(&config, Arc::new(ScriptedTransport::new())).unwrap();

        assert_eq!(registry.len(), 2);
        let indicators = registry.connector("reference-indicators").unwrap().metadata_set();
        assert_eq!(indicators.name(), "MER Reference Indicators");
        assert!(indicators.supports_autocomplete(None));
        assert!(indicators.supports_autocomplete(Some("indicator")));
        assert!(!indicators.supports_autocomplete(Some("indicator_group")));
        assert_eq!(
            indicators
                .export_formats(&ResourceType::from("reference_indicator"))
                .len(),
            3
        );

        let selections = Query::new("reference-indicators")
            .with_filter("indicator_group", "Treatment")
            .selections();
        let filters = indicators.available_filters(&selections);
        assert_eq!(filters["indicator"].options.len(), 1);
        assert_eq!(filters["indicator"].options[0].value, "TX_CURR");

        let elements = registry.connector("dhis2-data-elements").unwrap().metadata_set();
        assert!(elements.export_formats(&ResourceType::from("reference_indicator")).is_empty());
    }
}
