use ncollectd_core::config::{parse_file, ConfigValue};
use ncollectd_core::de::from_config;
use ncollectd_core::{ConfigError, LogLevel};
use serde::Deserialize;
use std::io::Write;

const SAMPLE: &str = r#"
# global options
Interval 10
LogLevel "warning"

<ignored> # comments may follow anything
"#;

const PLUGIN: &str = r#"
Interval 10

plugin mdb {
    Path "/var/lib/ncollectd/mdb"
    Sync true
    Compression "none"
    Table "cpu" {
        Retention 86400
        Match /^cpu_.*$/
    }
    Table "memory" {
        Retention 3600
    }
}
"#;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Compression {
    None,
    Lz4,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Table {
    retention: u32,
    #[serde(rename = "Match")]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct MdbSettings {
    path: String,
    sync: bool,
    compression: Compression,
    #[serde(rename = "Table")]
    tables: Vec<Table>,
    log_level: Option<LogLevel>,
}

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn plugin_block_deserializes() {
    let file = write_config(PLUGIN);
    let root = parse_file(file.path()).unwrap();
    assert_eq!(root.children[0].values, vec![ConfigValue::Number(10.0)]);

    let plugin = root.child("plugin").unwrap();
    assert_eq!(plugin.values, vec![ConfigValue::String(String::from("mdb"))]);
    assert_eq!(plugin.lineno, 4);
    assert_eq!(plugin.file_name(), file.path().to_string_lossy());

    let settings: MdbSettings = from_config(&plugin.children).unwrap();
    assert_eq!(
        settings,
        MdbSettings {
            path: String::from("/var/lib/ncollectd/mdb"),
            sync: true,
            compression: Compression::None,
            tables: vec![
                Table {
                    retention: 86400,
                    pattern: Some(String::from("^cpu_.*$")),
                },
                Table {
                    retention: 3600,
                    pattern: None,
                },
            ],
            log_level: None,
        }
    );
}

#[test]
fn parse_errors_name_the_file() {
    let file = write_config(SAMPLE);
    match parse_file(file.path()) {
        Err(e @ ConfigError::Parse { .. }) => {
            let msg = e.to_string();
            assert!(msg.starts_with(&*file.path().to_string_lossy()), "{}", msg);
            assert!(msg.contains(":6: invalid option name"), "{}", msg);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.conf");
    match parse_file(&path) {
        Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn dump_of_a_file_reparses_equal() {
    let file = write_config(PLUGIN);
    let root = parse_file(file.path()).unwrap();
    let again = write_config(&root.to_string());
    assert_eq!(parse_file(again.path()).unwrap(), root);
}

#[test]
fn wrong_value_type_names_the_field() {
    let file = write_config("Path 12\nSync true\nCompression \"none\"\n");
    let root = parse_file(file.path()).unwrap();
    let err = from_config::<MdbSettings>(&root.children).unwrap_err();
    assert!(err.to_string().contains("Path"), "{}", err);
}
