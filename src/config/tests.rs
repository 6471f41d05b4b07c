use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_refresh_every_six_hours_from_data_dir() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.storage.data_dir, PathBuf::from("data"));
    assert_eq!(settings.scheduler.cron, DEFAULT_REFRESH_CRON);
    assert!(settings.scheduler.run_on_startup);
    assert_eq!(settings.scheduler.startup_delay, Duration::from_secs(10));
    assert!(settings.server.allowed_origins.is_empty());
    assert!(settings.platforms.codeforces.credentials.is_none());
}

#[test]
fn invalid_cron_is_rejected() {
    let mut raw = RawSettings::default();
    raw.scheduler.cron = Some("every six hours".to_string());

    let err = Settings::from_raw(raw).expect_err("cron must parse");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "scheduler.cron",
            ..
        }
    ));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn allowed_origins_are_trimmed_and_validated() {
    let mut raw = RawSettings::default();
    raw.server.allowed_origins = Some(vec![
        " https://example.dev/ ".to_string(),
        String::new(),
        "http://localhost:5173".to_string(),
    ]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.server.allowed_origins,
        vec![
            "https://example.dev".to_string(),
            "http://localhost:5173".to_string()
        ]
    );

    let mut bad = RawSettings::default();
    bad.server.allowed_origins = Some(vec!["not a url".to_string()]);
    assert!(Settings::from_raw(bad).is_err());
}

#[test]
fn codeforces_credentials_must_come_in_pairs() {
    let mut raw = RawSettings::default();
    raw.platforms.codeforces.api_key = Some("key".to_string());

    let err = Settings::from_raw(raw).expect_err("secret missing");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "platforms.codeforces.api_key",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.platforms.codeforces.api_key = Some("key".to_string());
    raw.platforms.codeforces.api_secret = Some("secret".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    let credentials = settings.platforms.codeforces.credentials.expect("credentials");
    assert_eq!(credentials.api_key, "key");
    assert_eq!(credentials.api_secret, "secret");
}

#[test]
fn blank_handle_is_rejected() {
    let mut raw = RawSettings::default();
    raw.platforms.gfg.handle = Some("   ".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn base_url_override_is_parsed() {
    let mut raw = RawSettings::default();
    raw.platforms.leetcode.base_url = Some("http://127.0.0.1:9999".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.platforms.leetcode.base_url.as_str(),
        "http://127.0.0.1:9999/"
    );
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
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["codefolio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_scrape_arguments() {
    let args = CliArgs::parse_from([
        "codefolio",
        "scrape",
        "--data-dir",
        "/tmp/profiles",
        "--platform",
        "leetcode",
        "--platform",
        "gfg",
    ]);

    match args.command.expect("scrape command") {
        Command::Scrape(scrape) => {
            assert_eq!(
                scrape.storage.data_dir.as_deref(),
                Some(std::path::Path::new("/tmp/profiles"))
            );
            assert_eq!(
                scrape.platforms,
                vec![
                    crate::domain::types::Platform::LeetCode,
                    crate::domain::types::Platform::Gfg
                ]
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn scrape_rejects_unknown_platform() {
    let result = CliArgs::try_parse_from(["codefolio", "scrape", "--platform", "topcoder"]);
    assert!(result.is_err());
}

#[test]
fn serve_overrides_apply_scheduler_flags() {
    let args = CliArgs::parse_from([
        "codefolio",
        "serve",
        "--scheduler-cron",
        "0 */5 * * * *",
        "--scheduler-run-on-startup",
        "false",
        "--data-dir",
        "/srv/data",
    ]);

    let Some(Command::Serve(serve)) = args.command else {
        panic!("wrong command parsed");
    };

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&serve.overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.scheduler.cron, "0 */5 * * * *");
    assert!(!settings.scheduler.run_on_startup);
    assert_eq!(settings.storage.data_dir, PathBuf::from("/srv/data"));
}

#[test]
#[serial_test::serial]
fn environment_layer_overrides_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("deploy.toml");
    std::fs::write(
        &file,
        "[server]\nport = 6000\n\n[platforms.gfg]\nhandle = \"from-file\"\n",
    )
    .unwrap();

    // SAFETY: serialized with every other test that touches the process environment.
    unsafe { std::env::set_var("CODEFOLIO__PLATFORMS__GFG__HANDLE", "from-env") };
    let cli = CliArgs::try_parse_from([
        "codefolio",
        "--config-file",
        file.to_str().unwrap(),
        "scrape",
    ])
    .unwrap();
    let result = load(&cli);
    unsafe { std::env::remove_var("CODEFOLIO__PLATFORMS__GFG__HANDLE") };

    let settings = result.expect("valid settings");
    assert_eq!(settings.server.addr.port(), 6000);
    assert_eq!(settings.platforms.gfg.handle, "from-env");
}

#[test]
#[serial_test::serial]
fn bare_invocation_reads_port_and_origins_from_environment() {
    // SAFETY: serialized with every other test that touches the process environment.
    unsafe {
        std::env::set_var("PORT", "8080");
        std::env::set_var("ALLOWED_ORIGINS", "https://a.example,https://b.example");
    }
    let bare = load(&CliArgs::try_parse_from(["codefolio"]).unwrap());
    let explicit = load(&CliArgs::try_parse_from(["codefolio", "serve"]).unwrap());
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("ALLOWED_ORIGINS");
    }

    for settings in [bare.expect("bare settings"), explicit.expect("serve settings")] {
        assert_eq!(settings.server.addr.port(), 8080);
        assert_eq!(
            settings.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }
}

#[test]
#[serial_test::serial]
fn serve_args_from_env_default_to_no_overrides() {
    let args = ServeArgs::from_env().expect("no arguments to reject");
    assert!(args.overrides.server_port.is_none());
    assert!(args.overrides.allowed_origins.is_none());
}
