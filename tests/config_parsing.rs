use std::path::Path;

use reservation_service::config::ServiceConfig;

const FULL_CONFIG: &str = r#"
[account]
name = "alice"

[cassandra]
points = ["10.0.0.1", "10.0.0.2"]
keyspace = "medicines"
repl_factor = 2

[network.client]
ip = "127.0.0.1"
port = 8000

[network.server]
ip = "0.0.0.0"
port = 8000
"#;

#[test]
fn full_config_parses() {
    let config: ServiceConfig = toml::from_str(FULL_CONFIG).unwrap();
    assert_eq!(config.account.name, "alice");
    assert_eq!(config.cassandra.points, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(config.cassandra.keyspace, "medicines");
    assert_eq!(config.cassandra.repl_factor, 2);
    assert_eq!(config.network.client.port, 8000);
    assert_eq!(config.network.server.ip, "0.0.0.0");
}

#[test]
fn missing_section_is_rejected() {
    let without_cassandra = r#"
[account]
name = "alice"

[network.client]
ip = "127.0.0.1"
port = 8000

[network.server]
ip = "0.0.0.0"
port = 8000
"#;
    assert!(toml::from_str::<ServiceConfig>(without_cassandra).is_err());
}

#[test]
fn load_reads_a_file_and_validates_points() {
    let dir = std::env::temp_dir();
    let path = dir.join("reservation-service-config-test.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();
    let config = ServiceConfig::load(&path).unwrap();
    assert_eq!(config.cassandra.keyspace, "medicines");
    std::fs::remove_file(&path).ok();

    let empty_points = FULL_CONFIG.replace(r#"points = ["10.0.0.1", "10.0.0.2"]"#, "points = []");
    let path = dir.join("reservation-service-config-empty-points.toml");
    std::fs::write(&path, empty_points).unwrap();
    assert!(ServiceConfig::load(&path).is_err());
    std::fs::remove_file(&path).ok();
}

#[test]
fn load_rejects_missing_paths_and_directories() {
    assert!(ServiceConfig::load(Path::new("/definitely/not/here.toml")).is_err());
    assert!(ServiceConfig::load(&std::env::temp_dir()).is_err());
}
