use bookmux_tokio_rpc_client::{ClientConfig, ConfigError, Credentials};
use std::collections::HashMap;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn local_servers_emulate_latency() {
    let config = ClientConfig::new("localhost:4000");
    assert_eq!(config.artificial_delay, Duration::from_millis(150));

    let config = ClientConfig::new("bookmarks.example.com");
    assert_eq!(config.artificial_delay, Duration::ZERO);
}

#[test]
fn development_account_is_the_default() {
    let config =
        ClientConfig::from_lookup(lookup(&[("BOOKMUX_SERVER", "localhost:4000")])).unwrap();
    assert_eq!(
        config.credentials,
        Credentials::Basic {
            user: "alice".into(),
            password: "alice".into(),
        }
    );
}

#[test]
fn token_wins_over_user_and_password() {
    let config = ClientConfig::from_lookup(lookup(&[
        ("BOOKMUX_SERVER", "bookmarks.example.com"),
        ("BOOKMUX_USER", "bob"),
        ("BOOKMUX_PASSWORD", "secret"),
        ("BOOKMUX_TOKEN", "t0k3n"),
        ("BOOKMUX_ARTIFICIAL_DELAY_MS", "25"),
    ]))
    .unwrap();

    assert_eq!(config.credentials, Credentials::Token("t0k3n".into()));
    assert_eq!(config.artificial_delay, Duration::from_millis(25));

    let request = config.handshake_request().unwrap();
    assert_eq!(
        request.uri().to_string(),
        "ws://bookmarks.example.com/api/my/wsconnect?token=t0k3n"
    );
}

#[test]
fn invalid_settings_are_reported() {
    assert!(matches!(
        ClientConfig::from_lookup(lookup(&[])),
        Err(ConfigError::Missing("BOOKMUX_SERVER"))
    ));
    assert!(matches!(
        ClientConfig::from_lookup(lookup(&[
            ("BOOKMUX_SERVER", "localhost"),
            ("BOOKMUX_USER", "bob"),
        ])),
        Err(ConfigError::Missing("BOOKMUX_PASSWORD"))
    ));
    assert!(matches!(
        ClientConfig::from_lookup(lookup(&[
            ("BOOKMUX_SERVER", "localhost"),
            ("BOOKMUX_ARTIFICIAL_DELAY_MS", "soon"),
        ])),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn secrets_stay_out_of_debug_output() {
    let config = ClientConfig::new("localhost").with_credentials(Credentials::Basic {
        user: "bob".into(),
        password: "hunter2".into(),
    });
    let rendered = format!("{config:?}");
    assert!(rendered.contains("bob"));
    assert!(!rendered.contains("hunter2"));

    let rendered = format!("{:?}", Credentials::Token("t0k3n".into()));
    assert!(!rendered.contains("t0k3n"));
}
