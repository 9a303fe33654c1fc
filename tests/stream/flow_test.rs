/*!
 * Flow Control Tests
 *
 * Backpressure and connection loss across an in-memory duplex
 */

use coop_sync::stream::{duplex, duplex_with_water_marks};
use coop_sync::{Cx, StreamConfig, StreamError};
use tokio::runtime::Handle;

#[tokio::test]
async fn test_round_trip_hello() {
    let (client, server) = duplex(StreamConfig::default(), &Handle::current()).unwrap();
    let cx = Cx::new();

    client.write(b"hello").unwrap().await.unwrap();
    client.drain(&cx).await.unwrap();
    assert_eq!(&server.read(&cx, 5).await.unwrap()[..], b"hello");

    client.close().unwrap();
    client.wait_closed(&cx).await.unwrap();
    assert!(server.read(&cx, 5).await.unwrap().is_empty());
    assert!(server.at_eof().unwrap());
    server.close().unwrap();
}

#[tokio::test]
async fn test_backpressure_parks_writer_until_reader_catches_up() {
    let config = StreamConfig::default().with_limit(4);
    let (left, right) = duplex_with_water_marks(config, &Handle::current(), 8, 2).unwrap();
    let cx = Cx::new();

    // Over twice the limit: the reader pauses its side of the link.
    assert!(left.write(b"012345678").unwrap().is_ready());
    assert!(right.stats().reading_paused);

    // Queued past the high-water mark: the writer is paused.
    let pending = left.write(b"abcdefghij").unwrap();
    assert!(!pending.is_ready());
    assert!(left.stats().writing_paused);

    let drainer = {
        let left = left.clone();
        tokio::spawn(async move { left.drain(&Cx::new()).await })
    };
    tokio::task::yield_now().await;
    assert!(!drainer.is_finished());

    assert_eq!(&right.read(&cx, 100).await.unwrap()[..], b"012345678");
    pending.await.unwrap();
    drainer.await.unwrap().unwrap();
    assert!(!left.stats().writing_paused);

    assert_eq!(&right.read_exactly(&cx, 10).await.unwrap()[..], b"abcdefghij");

    left.close().unwrap();
    right.close().unwrap();
}

#[tokio::test]
async fn test_write_after_close_reports_lost_connection() {
    let (left, right) = duplex(StreamConfig::default(), &Handle::current()).unwrap();
    let cx = Cx::new();

    left.close().unwrap();
    let late = left.write(b"late").unwrap();
    assert!(matches!(late.await, Err(StreamError::ConnectionReset)));
    assert!(matches!(left.drain(&cx).await, Err(StreamError::ConnectionReset)));

    // The dropped write never reaches the peer.
    assert!(right.read(&cx, 16).await.unwrap().is_empty());
    right.close().unwrap();
}

#[tokio::test]
async fn test_abort_fails_peer_reads_and_drains() {
    let (left, right) = duplex(StreamConfig::default(), &Handle::current()).unwrap();
    let cx = Cx::new();

    let reader = {
        let right = right.clone();
        tokio::spawn(async move { right.read_line(&Cx::new()).await })
    };
    tokio::task::yield_now().await;

    left.abort(&cx).await.unwrap();
    let err = reader.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        StreamError::Transport(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset
    ));

    assert!(right.drain(&cx).await.is_err());
    assert!(right.wait_closed(&cx).await.is_err());
    assert!(right.stats().connection_lost);
}
