use super::*;
use crate::session::EventKind;
use crate::testing::instance_at;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const OK: &str = "error id=0 msg=ok";

/// One scripted exchange: the server reads a command, then writes the lines
type Step = Vec<&'static str>;

/// Start a one-shot ServerQuery stand-in. Returns its port and a handle
/// resolving to every command line it received.
async fn fake_server(steps: Vec<Step>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();

        write_half
            .write_all(b"TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface.\n\r")
            .await
            .unwrap();

        for step in steps {
            let Some(command) = lines.next_line().await.unwrap() else {
                return received;
            };
            received.push(command);
            for line in step {
                write_half
                    .write_all(format!("{}\n\r", line).as_bytes())
                    .await
                    .unwrap();
            }
        }

        // Hold the connection until the client goes away
        while let Ok(Some(command)) = lines.next_line().await {
            received.push(command);
        }
        received
    });

    (port, handle)
}

fn login_steps() -> Vec<Step> {
    vec![vec![OK], vec![OK]]
}

fn provider() -> ServerQueryProvider {
    ServerQueryProvider::new(SessionSettings {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    })
}

#[tokio::test]
async fn test_open_logs_in_and_selects_virtual_server() {
    let mut steps = login_steps();
    steps.push(vec![OK]);
    let (port, server) = fake_server(steps).await;

    let mut instance = instance_at(1, port);
    instance.client_nickname = Some("Banner Bot".to_string());

    let session = provider().open(&instance).await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    drop(session);

    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec![
            "login client_login_name=serveradmin client_login_password=s3cr\\/t".to_string(),
            "use port=9987".to_string(),
            "clientupdate client_nickname=Banner\\sBot".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_open_fails_on_rejected_login() {
    let (port, _server) =
        fake_server(vec![vec!["error id=520 msg=invalid\\sloginname\\sor\\spassword"]]).await;

    let result = provider().open(&instance_at(1, port)).await;
    match result {
        Err(SessionError::Protocol { code, message }) => {
            assert_eq!(code, 520);
            assert_eq!(message, "invalid loginname or password");
        }
        other => panic!("expected protocol error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_open_fails_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = provider().open(&instance_at(1, port)).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
}

#[tokio::test]
async fn test_request_collects_records() {
    let mut steps = login_steps();
    steps.push(vec![
        "clid=1 client_nickname=Alice client_type=0|clid=2 client_nickname=Bob\\sB client_type=0",
        OK,
    ]);
    steps.push(vec!["error id=1281 msg=database\\sempty\\sresult\\sset"]);
    let (port, _server) = fake_server(steps).await;

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    let before = session.last_activity();

    let reply = session.request("clientlist").await.unwrap();
    assert_eq!(reply.records().len(), 2);
    assert_eq!(
        reply.records()[1].get("client_nickname").map(String::as_str),
        Some("Bob B")
    );
    assert!(session.last_activity() >= before);

    let empty = session.request("banlist").await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_notification_during_request_is_delivered_by_wait() {
    let mut steps = login_steps();
    steps.push(vec![
        "notifycliententerview cfid=0 ctid=1 reasonid=0 clid=5 client_nickname=Carol",
        "virtualserver_name=Lobby",
        OK,
    ]);
    let (port, _server) = fake_server(steps).await;

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    let reply = session.request("serverinfo").await.unwrap();
    assert_eq!(
        reply.first().and_then(|r| r.get("virtualserver_name")).map(String::as_str),
        Some("Lobby")
    );

    match session.wait().await.unwrap() {
        SessionSignal::Event(event) => {
            assert_eq!(event.kind(), &EventKind::ClientEnterView);
            assert_eq!(event.fields().get("clid").map(String::as_str), Some("5"));
        }
        other => panic!("expected event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wait_reports_idle_tick_after_silence() {
    let (port, _server) = fake_server(login_steps()).await;

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    let signal = session.wait().await.unwrap();
    assert_eq!(signal, SessionSignal::IdleTick(1));
}

#[tokio::test]
async fn test_register_push_scope_sends_servernotifyregister() {
    let mut steps = login_steps();
    steps.push(vec![OK]);
    let (port, server) = fake_server(steps).await;

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    session.register_push_scope(PushScope::Server).await.unwrap();
    drop(session);

    let received = server.await.unwrap();
    assert_eq!(
        received.last().map(String::as_str),
        Some("servernotifyregister event=server")
    );
}

#[tokio::test]
async fn test_quit_closes_session() {
    let mut steps = login_steps();
    steps.push(vec![OK]);
    let (port, _server) = fake_server(steps).await;

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    session.request(QUIT_COMMAND).await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    let result = session.request("serverinfo").await;
    assert!(matches!(
        result,
        Err(SessionError::NotActive(SessionState::Closed))
    ));
}

#[tokio::test]
async fn test_lost_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        write_half.write_all(b"TS3\n\rWelcome\n\r").await.unwrap();
        for _ in 0..2 {
            lines.next_line().await.unwrap();
            write_half.write_all(b"error id=0 msg=ok\n\r").await.unwrap();
        }
        // Drop both halves: the server goes away
    });

    let mut session = provider().open(&instance_at(1, port)).await.unwrap();
    let result = session.wait().await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_unexpected_greeting_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let result = provider().open(&instance_at(1, port)).await;
    assert!(matches!(result, Err(SessionError::Protocol { .. })));
}
