use std::io::Write;

use clap::Parser;

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert_eq!(settings.content.root, PathBuf::from(DEFAULT_CONTENT_ROOT));
    assert_eq!(settings.content.parse, ParseOptions::default());
    assert!(settings.content.reload_interval.is_none());
    assert_eq!(settings.presence.heartbeat, Duration::from_secs(15));
    assert_eq!(settings.presence.member_ttl, Duration::from_secs(45));
    assert_eq!(settings.site.title, DEFAULT_SITE_TITLE);
    assert!(settings.site.publications.is_empty());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.content.root = Some(PathBuf::from("from-file"));

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        content: ContentOverrides {
            content_root: Some(PathBuf::from("from-cli")),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.content.root, PathBuf::from("from-cli"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_reload_interval_disables_reloads() {
    let mut raw = RawSettings::default();
    raw.content.reload_interval_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.content.reload_interval.is_none());

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        content_reload_interval_seconds: Some(60),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.content.reload_interval, Some(Duration::from_secs(60)));
}

#[test]
fn member_ttl_must_exceed_heartbeat() {
    let mut raw = RawSettings::default();
    raw.presence.heartbeat_seconds = Some(30);
    raw.presence.member_ttl_seconds = Some(30);

    let err = Settings::from_raw(raw).expect_err("ttl too short");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "presence.member_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn rejects_zero_words_per_minute() {
    let mut raw = RawSettings::default();
    raw.content.words_per_minute = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn rejects_shared_listener_address() {
    let mut raw = RawSettings::default();
    raw.server.admin_port = Some(DEFAULT_PUBLIC_PORT);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn site_urls_are_validated() {
    let mut raw = RawSettings::default();
    raw.site.publications = vec![RawPublication {
        name: "Lobsters".to_string(),
        url: "not a url".to_string(),
    }];
    let err = Settings::from_raw(raw).expect_err("bad url");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "site.publications",
            ..
        }
    ));
}

#[test]
fn loads_site_settings_from_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(
        file,
        r#"
[site]
title = "Field Notes"
base_url = "https://notes.example.com/"

[[site.publications]]
name = "Example Weekly"
url = "https://weekly.example.com/"

[content]
words_per_minute = 250
"#
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "quire",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "check",
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.site.title, "Field Notes");
    assert_eq!(settings.site.base_url.as_str(), "https://notes.example.com/");
    assert_eq!(
        settings.site.publications,
        vec![Publication {
            name: "Example Weekly".to_string(),
            url: Url::parse("https://weekly.example.com/").expect("url"),
        }]
    );
    assert_eq!(settings.content.parse.words_per_minute, 250);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quire"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "quire",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--content-root",
        "/srv/content",
        "--content-reload-interval-seconds",
        "30",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.content.content_root,
                Some(PathBuf::from("/srv/content"))
            );
            assert_eq!(serve.overrides.content_reload_interval_seconds, Some(30));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_check_arguments() {
    let args = CliArgs::parse_from(["quire", "check", "--content-root", "fixtures"]);

    match args.command.expect("check command") {
        Command::Check(check) => {
            assert_eq!(check.content.content_root, Some(PathBuf::from("fixtures")));
        }
        _ => panic!("wrong command parsed"),
    }
}
