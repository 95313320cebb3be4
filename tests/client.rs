//! End-to-end tests over an in-memory duplex stream.
//!
//! The "server" side of the duplex writes raw protocol lines and reads
//! back what the client sends, exercising the full path: framing, parsing,
//! dispatch, derived state, and replies.

use slirc_client::{Client, Message, ProtocolError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tracing_subscriber::EnvFilter;

fn harness() -> (Client<DuplexStream>, DuplexStream) {
    // Surface the library's tracing output under RUST_LOG; ignore the
    // error when a previous test already installed the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();

    let (client_end, server_end) = tokio::io::duplex(4096);
    (Client::new(client_end), server_end)
}

async fn server_send(server: &mut DuplexStream, line: &str) {
    server.write_all(line.as_bytes()).await.unwrap();
    server.write_all(b"\r\n").await.unwrap();
}

#[tokio::test]
async fn reads_parsed_messages_in_order() {
    let (mut client, mut server) = harness();
    server_send(&mut server, ":irc.example.net 001 me :Welcome").await;
    server_send(&mut server, ":bob!b@h PRIVMSG #a :hello").await;

    let first = client.read().await.unwrap();
    assert_eq!(first.command, "001");

    let second = client.read().await.unwrap();
    assert_eq!(second.command, "PRIVMSG");
    assert_eq!(second.trailing.as_deref(), Some("hello"));
}

#[tokio::test]
async fn ping_is_answered_automatically() {
    let (mut client, server) = harness();
    let (server_read, mut server_write) = tokio::io::split(server);
    server_send_half(&mut server_write, "PING :tepper.freenode.net").await;

    let message = client.read().await.unwrap();
    assert_eq!(message.command, "PING");

    let mut lines = BufReader::new(server_read).lines();
    let pong = lines.next_line().await.unwrap().unwrap();
    assert_eq!(pong, "PONG :tepper.freenode.net");
}

async fn server_send_half<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, line: &str) {
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\r\n").await.unwrap();
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let (mut client, mut server) = harness();
    server_send(&mut server, "@@@ not a message").await;
    server_send(&mut server, "").await;
    server_send(&mut server, "PING :still-alive").await;

    let message = client.read().await.unwrap();
    assert_eq!(message.command, "PING");
    assert_eq!(message.trailing.as_deref(), Some("still-alive"));
}

#[tokio::test]
async fn end_of_stream_is_a_reset() {
    let (mut client, server) = harness();
    drop(server);
    assert!(matches!(
        client.read().await,
        Err(ProtocolError::ConnectionReset)
    ));
}

#[tokio::test]
async fn join_names_flow_tracks_membership() {
    let (mut client, mut server) = harness();

    client.write(Message::join("#rust")).await.unwrap();
    assert_eq!(client.channel_names(), ["#rust"]);
    assert!(client.channels().is_syncing("#rust"));

    server_send(&mut server, ":srv 353 me = #rust :@carol +bob me").await;
    server_send(&mut server, ":srv 366 me #rust :End of /NAMES list").await;
    client.read().await.unwrap();
    client.read().await.unwrap();

    assert_eq!(client.users("#rust").unwrap(), ["bob", "carol", "me"]);
    assert!(!client.channels().is_syncing("#rust"));

    // A later unsolicited page must not alter membership.
    server_send(&mut server, ":srv 353 me = #rust :mallory").await;
    client.read().await.unwrap();
    assert_eq!(client.users("#rust").unwrap(), ["bob", "carol", "me"]);
}

#[tokio::test]
async fn membership_follows_join_part_kick_quit() {
    let (mut client, mut server) = harness();
    client.write(Message::join("#a")).await.unwrap();

    server_send(&mut server, ":dave!d@h JOIN #a").await;
    server_send(&mut server, ":erin!e@h JOIN #a").await;
    server_send(&mut server, ":frank!f@h JOIN #a").await;
    server_send(&mut server, ":erin!e@h PART #a :bye").await;
    server_send(&mut server, ":op!o@h KICK #a frank :spam").await;
    for _ in 0..5 {
        client.read().await.unwrap();
    }
    assert_eq!(client.users("#a").unwrap(), ["dave"]);

    server_send(&mut server, ":dave!d@h QUIT :netsplit").await;
    client.read().await.unwrap();
    assert_eq!(client.users("#a").unwrap(), Vec::<String>::new());

    // Our own part forgets the channel entirely.
    client.write(Message::part("#a")).await.unwrap();
    assert!(client.users("#a").is_err());
    assert_eq!(client.channel_count(), 0);
}

#[tokio::test]
async fn conversation_log_sees_both_directions() {
    let (mut client, mut server) = harness();
    server_send(&mut server, ":bob!b@h PRIVMSG #a :hi there").await;
    client.read().await.unwrap();
    client.write(Message::privmsg("#a", "hi bob")).await.unwrap();

    assert_eq!(client.messages("#a"), ["hi there", "hi bob"]);
    assert_eq!(client.messages("#b"), Vec::<String>::new());
}

#[tokio::test]
async fn registration_sends_nick_then_user() {
    let (client, server) = harness();
    let (server_read, _server_write) = tokio::io::split(server);

    client
        .register_user("alice", "al", "Alice Example")
        .await
        .unwrap();

    let mut lines = BufReader::new(server_read).lines();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK alice");
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        "USER al 0 * :Alice Example"
    );
}

#[tokio::test]
async fn batch_send_reports_progress_on_failure() {
    let (client, server) = harness();
    let writer = client.writer();

    let sent = writer
        .send_all(vec![Message::nick("a"), Message::nick("b")])
        .await
        .unwrap();
    assert_eq!(sent, 2);

    drop(server);
    drop(client);
    // The duplex buffer is gone; the first write must fail with zero sent.
    let err = writer
        .send_all(vec![Message::nick("c"), Message::nick("d")])
        .await
        .unwrap_err();
    assert_eq!(err.sent, 0);
}

#[tokio::test]
async fn writer_is_usable_from_another_task() {
    let (mut client, mut server) = harness();
    let writer = client.writer();

    let sender = tokio::spawn(async move {
        for k in 0..10 {
            writer
                .write(Message::privmsg("#a", &format!("msg {k}")))
                .await
                .unwrap();
        }
    });

    server_send(&mut server, "PING :x").await;
    let message = client.read().await.unwrap();
    assert_eq!(message.command, "PING");
    sender.await.unwrap();

    // Outgoing dispatch ran for each write.
    assert_eq!(client.messages("#a").len(), 10);
}
