use std::{env, process};

use varlink::{listen, ListenConfig, Listener, ServiceState, VarlinkService};

fn assert_cleared() {
    assert!(env::var("LISTEN_PID").is_err());
    assert!(env::var("LISTEN_FDS").is_err());
}

// Kept in one test, so the environment is not changed concurrently.
#[test]
fn test_activation_environment() {
    let _ = env_logger::builder().is_test(true).try_init();

    // another process
    env::set_var("LISTEN_PID", (process::id() + 1).to_string());
    env::set_var("LISTEN_FDS", "1");
    assert!(Listener::from_activation("unix:/run/org.example.ping")
        .unwrap()
        .is_none());
    assert_cleared();

    // more than one descriptor
    env::set_var("LISTEN_PID", process::id().to_string());
    env::set_var("LISTEN_FDS", "2");
    assert!(Listener::from_activation("tcp:127.0.0.1:0")
        .unwrap()
        .is_none());
    assert_cleared();

    assert!(Listener::from_activation("unix:/run/org.example.ping")
        .unwrap()
        .is_none());
    assert_cleared();

    // listen falls back to binding the address, and consumes the variables
    env::set_var("LISTEN_PID", "not a pid");
    env::set_var("LISTEN_FDS", "1");

    let service = VarlinkService::new("org.varlink", "test service", "0.1", "http://varlink.org");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activation");

    listen(
        &service,
        &format!("unix:{}", path.display()),
        &ListenConfig {
            idle_timeout: 1,
            poll_interval: 10,
            activation: true,
        },
    )
    .unwrap();

    assert_cleared();
    assert_eq!(service.state(), ServiceState::Stopped);
    assert!(!path.exists());
}
