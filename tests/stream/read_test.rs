/*!
 * Stream Read Tests
 *
 * Separator reads, exact reads, line handling and EOF behavior
 */

use bytes::Bytes;
use coop_sync::core::errors::LimitKind;
use coop_sync::{Cx, Stream, StreamError, StreamMode};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn reader(limit: usize) -> Stream {
    Stream::new(StreamMode::Read, limit).unwrap()
}

#[tokio::test]
async fn test_read_until_returns_through_separator() {
    let stream = reader(64);
    let cx = Cx::new();
    stream.feed_data(b"ab\ncd").unwrap();

    let chunk = stream.read_until(&cx, b"\n").await.unwrap();
    assert_eq!(chunk, Bytes::from_static(b"ab\n"));
    assert_eq!(stream.stats().buffered, 2);
}

#[tokio::test]
async fn test_read_until_multibyte_separator_across_feeds() {
    let stream = reader(64);
    let cx = Cx::new();
    let reader_task = {
        let stream = stream.clone();
        tokio::spawn(async move { stream.read_until(&Cx::new(), b"\r\n").await })
    };

    stream.feed_data(b"GET / HTTP/1.1\r").unwrap();
    tokio::task::yield_now().await;
    stream.feed_data(b"\nHost").unwrap();

    let line = reader_task.await.unwrap().unwrap();
    assert_eq!(line, Bytes::from_static(b"GET / HTTP/1.1\r\n"));
    assert_eq!(stream.read(&cx, 16).await.unwrap(), Bytes::from_static(b"Host"));
}

#[tokio::test]
async fn test_read_until_limit_without_separator() {
    let stream = reader(3);
    let cx = Cx::new();
    stream.feed_data(b"abcdef").unwrap();

    let err = stream.read_until(&cx, b"\n").await.unwrap_err();
    match err {
        StreamError::LimitExceeded { kind, consumed } => {
            assert_eq!(kind, LimitKind::NotFound);
            assert_eq!(consumed, 6);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // Nothing is consumed on a limit overrun.
    assert_eq!(stream.stats().buffered, 6);
}

#[tokio::test]
async fn test_read_until_separator_beyond_limit() {
    let stream = reader(3);
    let cx = Cx::new();
    stream.feed_data(b"abcde\n").unwrap();

    let err = stream.read_until(&cx, b"\n").await.unwrap_err();
    assert!(matches!(
        err,
        StreamError::LimitExceeded {
            kind: LimitKind::FoundBeyondLimit,
            consumed: 5
        }
    ));
}

#[tokio::test]
async fn test_read_until_partial_at_eof() {
    let stream = reader(64);
    let cx = Cx::new();
    stream.feed_data(b"tail").unwrap();
    stream.feed_eof().unwrap();

    let err = stream.read_until(&cx, b"\n").await.unwrap_err();
    match err {
        StreamError::IncompleteRead { partial, expected } => {
            assert_eq!(partial, Bytes::from_static(b"tail"));
            assert_eq!(expected, None);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(stream.at_eof().unwrap());
}

#[tokio::test]
async fn test_read_until_rejects_empty_separator() {
    let stream = reader(64);
    let err = stream.read_until(&Cx::new(), b"").await.unwrap_err();
    assert!(matches!(err, StreamError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_read_exactly_short_at_eof() {
    let stream = reader(64);
    let cx = Cx::new();
    stream.feed_data(b"1234").unwrap();
    stream.feed_eof().unwrap();

    let err = stream.read_exactly(&cx, 10).await.unwrap_err();
    match &err {
        StreamError::IncompleteRead { partial, expected } => {
            assert_eq!(partial.len(), 4);
            assert_eq!(*expected, Some(10));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "4 bytes read on a total of 10 expected bytes");
}

#[tokio::test]
async fn test_read_exactly_collects_across_feeds() {
    let stream = reader(64);
    let task = {
        let stream = stream.clone();
        tokio::spawn(async move { stream.read_exactly(&Cx::new(), 6).await })
    };

    for chunk in [&b"ab"[..], b"cd", b"efgh"] {
        tokio::task::yield_now().await;
        stream.feed_data(chunk).unwrap();
    }

    assert_eq!(task.await.unwrap().unwrap(), Bytes::from_static(b"abcdef"));
    assert_eq!(stream.stats().buffered, 2);
}

#[tokio::test]
async fn test_read_line_discards_overlong_line() {
    let stream = reader(4);
    let cx = Cx::new();
    stream.feed_data(b"abcdefgh\nrest\n").unwrap();

    let err = stream.read_line(&cx).await.unwrap_err();
    assert!(matches!(err, StreamError::LineTooLong(_)));
    assert_eq!(stream.read_line(&cx).await.unwrap(), Bytes::from_static(b"rest\n"));
}

#[tokio::test]
async fn test_read_line_clears_buffer_without_separator() {
    let stream = reader(4);
    let cx = Cx::new();
    stream.feed_data(b"abcdefgh").unwrap();

    let err = stream.read_line(&cx).await.unwrap_err();
    assert!(matches!(err, StreamError::LineTooLong(_)));
    assert_eq!(stream.stats().buffered, 0);
}

#[tokio::test]
async fn test_read_line_returns_partial_then_empty() {
    let stream = reader(64);
    let cx = Cx::new();
    stream.feed_data(b"no newline").unwrap();
    stream.feed_eof().unwrap();

    assert_eq!(stream.read_line(&cx).await.unwrap(), Bytes::from_static(b"no newline"));
    assert!(stream.read_line(&cx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lines_iterates_until_eof() {
    let stream = reader(64);
    let cx = Cx::new();
    stream.feed_data(b"one\ntwo\nthree").unwrap();
    stream.feed_eof().unwrap();

    let lines: Vec<Bytes> = stream
        .lines(&cx)
        .map(|line| line.unwrap())
        .collect()
        .await;
    assert_eq!(
        lines,
        vec![
            Bytes::from_static(b"one\n"),
            Bytes::from_static(b"two\n"),
            Bytes::from_static(b"three"),
        ]
    );
}

#[tokio::test]
async fn test_read_to_end_gathers_everything() {
    let stream = reader(3);
    let cx = Cx::new();
    stream.feed_data(b"0123456789").unwrap();
    stream.feed_eof().unwrap();

    assert_eq!(stream.read_to_end(&cx).await.unwrap(), Bytes::from_static(b"0123456789"));
    assert_eq!(stream.stats().bytes_consumed, 10);
}

#[tokio::test]
async fn test_cancelled_reader_leaves_data_for_next_reader() {
    let stream = reader(64);
    let cx = Cx::new();
    let task = {
        let stream = stream.clone();
        let cx = cx.clone();
        tokio::spawn(async move { stream.read_line(&cx).await })
    };

    tokio::task::yield_now().await;
    cx.cancel();
    assert!(matches!(task.await.unwrap(), Err(StreamError::Cancelled)));

    stream.feed_data(b"kept\n").unwrap();
    assert_eq!(
        stream.read_line(&Cx::new()).await.unwrap(),
        Bytes::from_static(b"kept\n")
    );
}

proptest! {
    #[test]
    fn prop_lines_reassemble_input(
        input in proptest::collection::vec(prop_oneof![Just(b'\n'), any::<u8>()], 0..256),
        split in 1usize..32,
    ) {
        let stream = reader(1024);
        for chunk in input.chunks(split) {
            stream.feed_data(chunk).unwrap();
        }
        stream.feed_eof().unwrap();

        let cx = Cx::new();
        let lines: Vec<Bytes> = tokio_test::block_on(
            stream.lines(&cx).map(|line| line.unwrap()).collect(),
        );

        let joined: Vec<u8> = lines.iter().flat_map(|l| l.iter().copied()).collect();
        prop_assert_eq!(joined, input);
        for line in lines.iter().rev().skip(1) {
            prop_assert_eq!(line.last(), Some(&b'\n'));
        }
    }
}
