/*!
 * Sendfile Fallback Tests
 */

use crate::support::RecordingTransport;
use coop_sync::core::limits::SENDFILE_FALLBACK_CHUNK;
use coop_sync::{Cx, Stream, StreamError};
use std::io::{Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn file_with(contents: &[u8]) -> std::fs::File {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(contents).unwrap();
    file
}

fn writer(transport: &Arc<RecordingTransport>) -> Stream {
    Stream::builder()
        .with_transport(Arc::clone(transport) as Arc<dyn coop_sync::Transport>)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_fallback_sends_requested_range() {
    let transport = Arc::new(RecordingTransport::default());
    let stream = writer(&transport);
    let mut file = file_with(b"0123456789");

    let sent = stream
        .sendfile(&Cx::new(), &mut file, 2, Some(5), true)
        .await
        .unwrap();

    assert_eq!(sent, 5);
    assert_eq!(transport.written(), b"23456".to_vec());
    assert_eq!(file.stream_position().unwrap(), 7);
}

#[tokio::test]
async fn test_fallback_to_end_of_file() {
    let transport = Arc::new(RecordingTransport::default());
    let stream = writer(&transport);
    let mut file = file_with(b"abcdef");
    file.seek(SeekFrom::Start(0)).unwrap();

    let sent = stream
        .sendfile(&Cx::new(), &mut file, 0, None, true)
        .await
        .unwrap();

    assert_eq!(sent, 6);
    assert_eq!(transport.written(), b"abcdef".to_vec());
}

#[tokio::test]
async fn test_without_fallback_reports_unsupported() {
    let transport = Arc::new(RecordingTransport::default());
    let stream = writer(&transport);
    let mut file = file_with(b"abc");

    let err = stream
        .sendfile(&Cx::new(), &mut file, 0, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StreamError::Unsupported(_)));
    assert!(transport.written().is_empty());
}

#[tokio::test]
async fn test_fallback_yields_between_chunks() {
    let transport = Arc::new(RecordingTransport::default());
    let stream = writer(&transport);
    let size = 16 * SENDFILE_FALLBACK_CHUNK;
    let mut file = file_with(&vec![7u8; size]);

    let ticks = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        })
    };

    let sent = stream
        .sendfile(&Cx::new(), &mut file, 0, None, true)
        .await
        .unwrap();
    let during = ticks.load(Ordering::SeqCst);
    done.store(true, Ordering::SeqCst);
    ticker.await.unwrap();

    assert_eq!(sent, size);
    assert_eq!(transport.written().len(), size);
    assert!(during > 0, "no other task ran during sendfile");
}
