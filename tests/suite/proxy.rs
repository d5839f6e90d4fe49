//! End-to-end sessions against fake noisy servers.

#![cfg(unix)]

use sieve_lsp::{
    InitializationOptions, Proxy, ServerLog, ServerProcess, SpawnError, messages, run_proxy,
};

use crate::common::{
    EXIT, INITIALIZE, INITIALIZED, SHUTDOWN, framed, read_bodies, sh_server,
    wait_for_file_contains,
};

/// Prints a banner and one message of its own, then echoes the editor's
/// frames back until stdin closes.
const NOISY_ECHO: &str = r"printf 'Welcome to Idris 2.\n'; printf 'Content-Length: 2\r\n\r\n{}'; printf 'warning: slow\n' >&2; exec cat";

#[tokio::test]
async fn test_session_with_editor_exit() {
    let input = framed(&[INITIALIZE, INITIALIZED, EXIT]).await;
    let options = InitializationOptions::default().to_json();
    let mut out = Vec::new();

    let summary = run_proxy(
        &sh_server(NOISY_ECHO),
        options.clone(),
        ServerLog::tracing_only(),
        input.as_slice(),
        &mut out,
    )
    .await
    .unwrap();

    let bodies = read_bodies(&out).await;
    assert_eq!(bodies.len(), 4);
    assert_eq!(bodies[0], serde_json::json!({}));
    assert_eq!(bodies[1]["method"], "initialize");
    assert_eq!(
        bodies[1]["params"]["initializationOptions"],
        options.unwrap()
    );
    assert_eq!(bodies[2]["method"], "initialized");
    assert_eq!(bodies[3]["method"], "exit");

    let relayed = summary.relayed.unwrap();
    assert_eq!(relayed.messages, 4);
    assert_eq!(relayed.noise_bytes, b"Welcome to Idris 2.\n".len() as u64);
    assert!(relayed.leftover.is_clean());
    assert_eq!(summary.frames_to_server, 3);
    assert!(summary.client_sent_exit);
    assert!(summary.exit_status.unwrap().success());
}

#[tokio::test]
async fn test_exit_sent_when_editor_disconnects() {
    let input = framed(&[INITIALIZED, SHUTDOWN]).await;
    let mut out = Vec::new();

    let summary = run_proxy(
        &sh_server("exec cat"),
        None,
        ServerLog::tracing_only(),
        input.as_slice(),
        &mut out,
    )
    .await
    .unwrap();

    let methods: Vec<_> = read_bodies(&out)
        .await
        .into_iter()
        .map(|body| body["method"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(methods, ["initialized", "shutdown", "exit"]);
    assert!(!summary.client_sent_exit);
    assert_eq!(summary.frames_to_server, 2);
}

#[tokio::test]
async fn test_without_options_initialize_is_verbatim() {
    let input = framed(&[INITIALIZE, EXIT]).await;
    let mut out = Vec::new();

    run_proxy(
        &sh_server("exec cat"),
        None,
        ServerLog::tracing_only(),
        input.as_slice(),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(out, input);
}

#[tokio::test]
async fn test_server_exit_ends_session() {
    let script = r"printf 'Error: cannot find package\n'; printf 'Content-Length: 2\r\n\r\n{}'";
    // The editor side stays open; only the server ends the session.
    let (_editor, client_in) = tokio::io::duplex(64);
    let mut out = Vec::new();

    let summary = run_proxy(
        &sh_server(script),
        None,
        ServerLog::tracing_only(),
        client_in,
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(out, b"Content-Length: 2\r\n\r\n{}");
    let relayed = summary.relayed.unwrap();
    assert_eq!(relayed.messages, 1);
    assert_eq!(relayed.noise_bytes, b"Error: cannot find package\n".len() as u64);
    assert_eq!(summary.frames_to_server, 0);
    assert!(!summary.client_sent_exit);
}

#[tokio::test]
async fn test_truncated_last_message_is_not_an_error() {
    let script = r"printf 'Content-Length: 2\r\n\r\n{}Content-Length: 10\r\n\r\nabc'";
    let (_editor, client_in) = tokio::io::duplex(64);
    let mut out = Vec::new();

    let summary = run_proxy(
        &sh_server(script),
        None,
        ServerLog::tracing_only(),
        client_in,
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(out, b"Content-Length: 2\r\n\r\n{}Content-Length: 10\r\n\r\nabc");
    let relayed = summary.relayed.unwrap();
    assert_eq!(relayed.messages, 1);
    assert_eq!(relayed.leftover.missing_payload, 7);
}

#[tokio::test]
async fn test_noise_and_stderr_reach_noise_file() {
    let dir = tempfile::tempdir().unwrap();
    let noise_file = dir.path().join("idris2-lsp.log");
    let log = ServerLog::open(&noise_file).unwrap();
    let input = framed(&[EXIT]).await;
    let mut out = Vec::new();

    run_proxy(&sh_server(NOISY_ECHO), None, log, input.as_slice(), &mut out)
        .await
        .unwrap();

    let content = wait_for_file_contains(&noise_file, "warning: slow\n").await;
    assert!(content.contains("> STDOUT\nWelcome to Idris 2.\n< STDOUT\n"));
}

#[tokio::test]
async fn test_server_runs_in_configured_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let cwd = dir.path().canonicalize().unwrap();
    let script = r#"printf 'Content-Length: %d\r\n\r\n%s' "${#PWD}" "$PWD""#;
    let config = sh_server(script).with_cwd(Some(cwd.clone()));
    let (_editor, client_in) = tokio::io::duplex(64);
    let mut out = Vec::new();

    run_proxy(&config, None, ServerLog::tracing_only(), client_in, &mut out)
        .await
        .unwrap();

    let header = format!("Content-Length: {}\r\n\r\n", cwd.as_os_str().len());
    assert_eq!(out, [header.as_bytes(), cwd.as_os_str().as_encoded_bytes()].concat());
}

#[tokio::test]
async fn test_missing_server_is_spawn_error() {
    let config = sieve_lsp::ServerConfig::new("sieve-test-no-such-language-server");
    let mut out = Vec::new();

    let err = run_proxy(
        &config,
        None,
        ServerLog::tracing_only(),
        b"".as_slice(),
        &mut out,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SpawnError>(),
        Some(SpawnError::NotFound { .. })
    ));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_proxy_from_spawned_server() {
    let server = ServerProcess::spawn(&sh_server("exec cat")).unwrap();
    assert_eq!(server.command(), "sh");
    let input = framed(&[INITIALIZED, EXIT]).await;
    let mut out = Vec::new();

    let summary = Proxy::new(server, ServerLog::tracing_only())
        .run(input.as_slice(), &mut out)
        .await
        .unwrap();

    assert_eq!(out, input);
    assert_eq!(summary.relayed.unwrap().messages, 2);
}

#[tokio::test]
async fn test_message_stream_over_child_stdout() {
    use futures_util::StreamExt;

    let script = r"printf 'Content-Length: 2\r\n\r\n{}'; printf 'noise'; printf 'Content-Length: 2\r\n\r\n[]'";
    let mut server = ServerProcess::spawn(&sh_server(script)).unwrap();
    let stdout = server.take_stdout().unwrap();
    assert!(server.take_stdout().is_none());

    let mut noise = Vec::new();
    let got: Vec<Vec<u8>> = {
        let stream = std::pin::pin!(messages(stdout, &mut noise));
        stream.map(Result::unwrap).collect().await
    };

    assert_eq!(
        got,
        vec![
            b"Content-Length: 2\r\n\r\n{}".to_vec(),
            b"Content-Length: 2\r\n\r\n[]".to_vec()
        ]
    );
    assert_eq!(noise, b"noise");
    assert!(server.shutdown(false).await.is_some());
}
