use super::*;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    #[serial]
    fn home_override_from_environment() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        // SAFETY: serialized with every other test that touches the environment
        unsafe { std::env::set_var("WARD_RAG_HOME", temp_dir.path()) };
        let dir = get_config_dir().expect("config dir resolves");
        // SAFETY: see above
        unsafe { std::env::remove_var("WARD_RAG_HOME") };

        assert_eq!(dir, temp_dir.path());
    }

    #[test]
    #[serial]
    fn home_default_without_override() {
        // SAFETY: serialized with every other test that touches the environment
        unsafe { std::env::remove_var("WARD_RAG_HOME") };

        let dir = get_config_dir().expect("home directory exists in test environment");
        assert!(dir.ends_with(".ward-rag"));
    }

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            geocoder: GeocoderConfig {
                region: "Bengaluru, India".to_string(),
                tie_break: TieBreak::Strict,
                ..GeocoderConfig::default()
            },
            boundaries: BoundaryConfig {
                source: "/data/bbmp_wards.geojson".to_string(),
                city: "Bengaluru".to_string(),
                table_name: "bbmp_wards".to_string(),
                ..BoundaryConfig::default()
            },
            base_dir: PathBuf::new(),
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_tie_break_is_rejected() {
        let toml = r#"
            [geocoder]
            tie_break = "random"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            model = "all-minilm"
            batch_size = 32
            embedding_dimension = 384

            [llm]
            model = "llama3:8b"
            extraction_max_tokens = 50
            answer_max_tokens = 256
            answer_temperature = 0.7

            [geocoder]
            base_url = "https://nominatim.openstreetmap.org"
            user_agent = "geo_rag_app"
            region = "Delhi, India"
            result_limit = 3
            tie_break = "first"

            [boundaries]
            source = "https://example.com/wards.geojson"
            city = "Delhi"
            id_property = "ward_no"
            name_property = "ward_name"
            table_name = "delhi_wards"

            [http]
            timeout_seconds = 15
            retry_attempts = 2
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse valid config");
        assert!(config.validate().is_ok());
        assert_eq!(config.ollama.embedding_dimension, 384);
        assert_eq!(config.geocoder.result_limit, 3);
        assert_eq!(config.http.retry_attempts, 2);
    }
}
