use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use h1stream::ParserState;
use http::{Method, StatusCode};
use rstest::rstest;

use super::*;

/// Inner reader handing out at most `step` bytes per read
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Inner reader returning `data` once, then failing with `kind`
struct Failing {
    data: Vec<u8>,
    kind: io::ErrorKind,
}

impl Read for Failing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.is_empty() {
            return Err(io::Error::new(self.kind, "injected"));
        }
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        Ok(n)
    }
}

/// Inner reader replaying one scripted outcome per read, then end of stream
struct Scripted(VecDeque<Result<&'static [u8], io::ErrorKind>>);

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.pop_front() {
            Some(Ok(data)) => {
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            },
            Some(Err(kind)) => Err(io::Error::new(kind, "scripted")),
            None => Ok(0),
        }
    }
}

/// Inner writer accepting at most `max` bytes per write
struct Limited {
    out: Vec<u8>,
    max: usize,
}

impl Write for Limited {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.max.min(buf.len());
        self.out.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Broken;

impl Write for Broken {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
    }
}

struct Panicker;

impl StreamListener for Panicker {
    fn stream_complete(&self, _event: &StreamEvent) {
        panic!("listener failure");
    }

    fn stream_error(&self, _event: &StreamEvent) {}
}

fn connection(port: u16) -> Arc<MonitoredConnection> {
    Arc::new(MonitoredConnection::new(
        ConnectionId(1),
        port,
        Arc::new(TransactionsCache::new()),
    ))
}

fn reader<R>(conn: &Arc<MonitoredConnection>, inner: R) -> (ParsingReader<R>, Arc<EventCollector>) {
    let events = Arc::new(EventCollector::new());
    let mut reader = conn.reader(inner);
    reader.add_listener(events.clone());
    (reader, events)
}

fn read_all<R: Read>(reader: &mut ParsingReader<R>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return out,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) => panic!("unexpected read error: {err}"),
        }
    }
}

fn send_requests(conn: &Arc<MonitoredConnection>, requests: &[&[u8]]) {
    let mut writer = conn.writer(Vec::new());
    for request in requests {
        writer.write_all(request).unwrap();
    }
}

const OK: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
const CHUNKED: &[u8] =
    b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nwiki\r\n0\r\n\r\n";
const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nNot Found";

// =========================================================================
// Response tracking
// =========================================================================

#[test]
fn test_close_delimited_response_of_512_bytes() {
    let head = b"HTTP/1.1 200 OK\nContent-Type: text/plain\n\n";
    let mut data = head.to_vec();
    data.resize(512, b'x');

    let conn = connection(80);
    let (mut reader, events) = reader(&conn, Trickle {
        data: &data,
        step: 100,
    });
    assert_eq!(read_all(&mut reader), data);

    let events = events.drain();
    assert_eq!(events.len(), 1);
    let record = events[0].transaction();
    assert_eq!(record.status(), Some(StatusCode::OK));
    assert_eq!(record.bytes_received(), 512);
    assert!(record.is_finalized());
    assert!(!record.socket_reuse());
    assert!(reader.parser().is_sink());
}

#[test]
fn test_error_response_keeps_body() {
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, NOT_FOUND);
    read_all(&mut reader);

    let events = events.drain();
    let record = events[0].transaction();
    assert_eq!(record.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(record.error_body().map(|b| &b[..]), Some(b"Not Found".as_slice()));
}

#[test]
fn test_error_body_not_kept_when_capture_disabled() {
    let conn = Arc::new(
        MonitoredConnection::new(ConnectionId(2), 80, Arc::new(TransactionsCache::new()))
            .with_config(Arc::new(InstrumentConfig::timing_only())),
    );
    let (mut reader, events) = reader(&conn, NOT_FOUND);
    read_all(&mut reader);

    let events = events.drain();
    assert_eq!(events[0].transaction().status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(events[0].transaction().error_body(), None);
}

#[rstest]
#[case(2)]
#[case(3)]
#[case(5)]
fn test_n_responses_produce_n_records(#[case] n: usize) {
    let conn = connection(80);
    let data: Vec<u8> = std::iter::repeat_n(OK, n).flatten().copied().collect();
    let (mut reader, events) = reader(&conn, Trickle {
        data: &data,
        step: 7,
    });
    read_all(&mut reader);

    let events = events.drain();
    assert_eq!(events.len(), n);
    assert!(!events[0].transaction().socket_reuse());
    assert!(events[1..].iter().all(|e| e.transaction().socket_reuse()));
    assert_eq!(reader.tracker().read_count(), n as u64);

    // Every reused record was also published, complete, for the request side
    let published: Vec<_> = std::iter::from_fn(|| conn.cache().take_reused(conn.id())).collect();
    assert_eq!(published.len(), n - 1);
    assert!(published.iter().all(|r| r.is_finalized() && r.socket_reuse()));
    assert!(published.iter().all(|r| r.bytes_received() == OK.len() as u64));
}

#[test]
fn test_long_keep_alive_connection_does_not_grow_cache() {
    let conn = connection(80);
    let data: Vec<u8> = std::iter::repeat_n(OK, 1000).flatten().copied().collect();
    let (mut reader, events) = reader(&conn, data.as_slice());
    read_all(&mut reader);

    assert_eq!(events.len(), 1000);
    assert_eq!(conn.cache().reused_len(conn.id()), MAX_REUSED_SNAPSHOTS);
    reader.notify_closing();
    assert_eq!(conn.cache().reused_len(conn.id()), 0);
}

#[rstest]
#[case::notify_closing(true)]
#[case::dropped(false)]
fn test_closed_reader_releases_unanswered_requests(#[case] notify: bool) {
    let conn = connection(80);
    send_requests(&conn, &[
        b"GET /one HTTP/1.1\r\nHost: h\r\n\r\n".as_slice(),
        b"GET /never HTTP/1.1\r\nHost: h\r\n\r\n",
    ]);
    let (mut reader, events) = reader(&conn, OK);
    read_all(&mut reader);
    assert_eq!(conn.cache().pending_len(conn.id()), 1);

    if notify {
        reader.notify_closing();
    } else {
        drop(reader);
    }
    assert_eq!(conn.cache().pending_len(conn.id()), 0);
    assert!(conn.cache().is_empty());
    assert_eq!(events.len(), 1);
}

#[rstest]
#[case(b"HTTP/1.1 100 Continue\r\n\r\n".as_slice())]
#[case(b"HTTP/1.1 103 Early Hints\r\nLink: </app.css>; rel=preload\r\n\r\n".as_slice())]
#[case(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 102 Processing\r\n\r\n".as_slice())]
fn test_interim_responses_belong_to_their_request(#[case] interim: &[u8]) {
    let conn = connection(80);
    send_requests(&conn, &[
        b"POST /upload HTTP/1.1\r\nHost: h\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\nabc"
            .as_slice(),
        b"GET /next HTTP/1.1\r\nHost: h\r\n\r\n",
    ]);
    let created = b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n".as_slice();
    let data = [interim, created, OK].concat();
    let (mut reader, events) = reader(&conn, Trickle {
        data: &data,
        step: 9,
    });
    read_all(&mut reader);

    let records: Vec<_> = events
        .drain()
        .into_iter()
        .map(StreamEvent::into_transaction)
        .collect();
    let summary: Vec<_> = records
        .iter()
        .map(|t| {
            (
                t.method().cloned(),
                t.uri().map(|u| u.path().to_string()),
                t.status().map(|s| s.as_u16()),
                t.socket_reuse(),
            )
        })
        .collect();
    assert_eq!(summary, vec![
        (Some(Method::POST), Some("/upload".to_string()), Some(201), false),
        (Some(Method::GET), Some("/next".to_string()), Some(200), true),
    ]);
    assert_eq!(records[0].bytes_received(), (interim.len() + created.len()) as u64);
    assert_eq!(records[1].bytes_received(), OK.len() as u64);
    assert_eq!(reader.tracker().read_count(), 2);
    assert!(conn.cache().is_empty());
}

#[test]
fn test_switching_protocols_is_a_final_response() {
    let conn = connection(80);
    send_requests(&conn, &[
        b"GET /chat HTTP/1.1\r\nHost: h\r\nUpgrade: websocket\r\n\r\n".as_slice(),
    ]);
    let upgrade = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n";
    let (mut reader, events) = reader(&conn, upgrade.as_slice());
    read_all(&mut reader);

    let events = events.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].transaction().status(), Some(StatusCode::SWITCHING_PROTOCOLS));
    assert_eq!(events[0].transaction().uri().map(|u| u.path()), Some("/chat"));
}

#[test]
fn test_pipelined_requests_match_responses_in_order() {
    let conn = connection(80);
    send_requests(&conn, &[
        b"GET /one HTTP/1.1\r\nHost: example.com\r\n\r\n".as_slice(),
        b"GET /two HTTP/1.1\r\nHost: example.com\r\n\r\n",
        b"DELETE /three HTTP/1.1\r\nHost: example.com\r\n\r\n",
    ]);
    assert_eq!(conn.cache().pending_len(conn.id()), 3);

    let data = [OK, CHUNKED, NOT_FOUND].concat();
    let (mut reader, events) = reader(&conn, data.as_slice());
    read_all(&mut reader);

    let paths: Vec<_> = events
        .drain()
        .iter()
        .map(|e| {
            let t = e.transaction();
            (
                t.method().cloned(),
                t.uri().map(|u| u.path().to_string()),
                t.status().map(|s| s.as_u16()),
            )
        })
        .collect();
    assert_eq!(paths, vec![
        (Some(Method::GET), Some("/one".to_string()), Some(200)),
        (Some(Method::GET), Some("/two".to_string()), Some(200)),
        (Some(Method::DELETE), Some("/three".to_string()), Some(404)),
    ]);
    assert!(conn.cache().is_empty());
}

#[test]
fn test_head_request_response_has_no_body() {
    let conn = connection(80);
    send_requests(&conn, &[
        b"HEAD /big HTTP/1.1\r\nHost: h\r\n\r\n".as_slice(),
        b"GET /small HTTP/1.1\r\nHost: h\r\n\r\n",
    ]);
    let head_response = b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n";
    let data = [head_response.as_slice(), OK].concat();
    let (mut reader, events) = reader(&conn, data.as_slice());
    read_all(&mut reader);

    let received: Vec<_> = events
        .drain()
        .iter()
        .map(|e| e.transaction().bytes_received())
        .collect();
    assert_eq!(received, vec![head_response.len() as u64, OK.len() as u64]);
}

#[test]
fn test_response_without_pending_shell_still_recorded() {
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, OK);
    read_all(&mut reader);

    let events = events.drain();
    let record = events[0].transaction();
    assert_eq!(record.method(), None);
    assert_eq!(record.port(), Some(80));
    assert_eq!(record.status(), Some(StatusCode::OK));
}

#[test]
fn test_first_https_response_takes_connect_timing() {
    let cache = Arc::new(TransactionsCache::new());
    let tcp = TcpData {
        connect_start: TimestampNs(1_000),
        connect_end:   TimestampNs(3_000),
    };
    let conn = Arc::new(
        MonitoredConnection::new(ConnectionId(7), 443, cache.clone())
            .with_handle(ConnectionHandle(42)),
    );
    conn.record_connect(tcp);

    let data = [OK, OK].concat();
    let (mut reader, events) = reader(&conn, data.as_slice());
    read_all(&mut reader);

    let events = events.drain();
    assert_eq!(events[0].transaction().scheme(), Scheme::Https);
    assert_eq!(events[0].transaction().tcp_connect_start(), Some(TimestampNs(1_000)));
    assert_eq!(events[0].transaction().tcp_connect_end(), Some(TimestampNs(3_000)));
    assert_eq!(events[1].transaction().tcp_connect_start(), None);
}

#[test]
fn test_missing_connect_timing_is_not_fatal() {
    let conn = Arc::new(
        MonitoredConnection::new(ConnectionId(8), 443, Arc::new(TransactionsCache::new()))
            .with_handle(ConnectionHandle(43)),
    );
    let (mut reader, events) = reader(&conn, OK);
    read_all(&mut reader);

    let events = events.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].transaction().tcp_connect_start(), None);
    assert!(events[0].transaction().is_finalized());
}

#[test]
fn test_plain_http_ignores_connect_timing() {
    let cache = Arc::new(TransactionsCache::new());
    let conn = Arc::new(
        MonitoredConnection::new(ConnectionId(9), 80, cache).with_handle(ConnectionHandle(44)),
    );
    conn.record_connect(TcpData {
        connect_start: TimestampNs(1),
        connect_end:   TimestampNs(2),
    });
    let (mut reader, events) = reader(&conn, OK);
    read_all(&mut reader);

    assert_eq!(events.drain()[0].transaction().tcp_connect_start(), None);
}

// =========================================================================
// Stream decoration
// =========================================================================

#[rstest]
#[case(1)]
#[case(3)]
#[case(64)]
fn test_reader_passes_bytes_through(#[case] step: usize) {
    let data = [OK, b"garbage that is not http\r\n".as_slice(), CHUNKED].concat();
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, Trickle { data: &data, step });

    assert_eq!(read_all(&mut reader), data);
    assert_eq!(events.len(), 1);
    assert!(reader.parser().is_sink());
}

#[test]
fn test_read_error_is_published_and_returned() {
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, Failing {
        data: b"HTTP/1.1 200 OK\r\nContent-Le".to_vec(),
        kind: io::ErrorKind::ConnectionReset,
    });

    let mut buf = [0u8; 128];
    assert!(reader.read(&mut buf).is_ok());
    let err = reader.read(&mut buf).map(|_| ()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(err.to_string(), "injected");

    let events = events.drain();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());
    assert_eq!(
        events[0].fault().map(|f| f.kind),
        Some(io::ErrorKind::ConnectionReset)
    );
    assert_eq!(events[0].transaction().status(), Some(StatusCode::OK));
    assert!(events[0].transaction().error().is_some());

    // The failed transaction keeps its parser for diagnosis
    reader.notify_closing();
    assert!(!reader.parser().is_sink());
}

#[test]
fn test_transient_fault_between_responses_keeps_next_request() {
    let conn = connection(80);
    send_requests(&conn, &[
        b"GET /one HTTP/1.1\r\nHost: h\r\n\r\n".as_slice(),
        b"GET /two HTTP/1.1\r\nHost: h\r\n\r\n",
    ]);
    let (mut reader, events) = reader(
        &conn,
        Scripted(VecDeque::from([Ok(OK), Err(io::ErrorKind::TimedOut), Ok(OK)])),
    );

    let mut buf = [0u8; 64];
    assert_eq!(reader.read(&mut buf).ok(), Some(OK.len()));
    assert_eq!(
        reader.read(&mut buf).map_err(|e| e.kind()).err(),
        Some(io::ErrorKind::TimedOut)
    );
    assert_eq!(reader.read(&mut buf).ok(), Some(OK.len()));

    let summary: Vec<_> = events
        .drain()
        .iter()
        .map(|e| {
            let t = e.transaction();
            (
                e.is_error(),
                t.uri().map(|u| u.path().to_string()),
                t.status().map(|s| s.as_u16()),
            )
        })
        .collect();
    assert_eq!(summary, vec![
        (false, Some("/one".to_string()), Some(200)),
        (true, Some("/two".to_string()), None),
        (false, Some("/two".to_string()), Some(200)),
    ]);
    assert!(conn.cache().is_empty());
}

#[rstest]
#[case(io::ErrorKind::WouldBlock)]
#[case(io::ErrorKind::Interrupted)]
fn test_retry_errors_are_not_published(#[case] kind: io::ErrorKind) {
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, Failing {
        data: Vec::new(),
        kind,
    });
    let mut buf = [0u8; 8];
    assert_eq!(reader.read(&mut buf).map_err(|e| e.kind()), Err(kind));
    assert!(events.is_empty());
}

#[test]
fn test_notify_closing_stops_parsing() {
    let conn = connection(80);
    let data = [OK, OK].concat();
    let (mut reader, events) = reader(&conn, Trickle {
        data: &data,
        step: OK.len(),
    });

    let mut buf = vec![0u8; OK.len()];
    reader.read_exact(&mut buf).unwrap();
    reader.notify_closing();
    assert!(reader.parser().is_sink());

    let rest = read_all(&mut reader);
    assert_eq!(rest, OK);
    assert_eq!(events.len(), 1);
}

#[test]
fn test_listener_panic_disables_parsing_only() {
    let conn = connection(80);
    let data = [OK, OK].concat();
    let (mut reader, events) = reader(&conn, data.as_slice());
    reader.add_listener(Arc::new(Panicker));

    assert_eq!(read_all(&mut reader), data);
    assert!(reader.parser().is_sink());
    // The collector ran before the panicking listener on the first response
    assert_eq!(events.len(), 1);
}

#[test]
fn test_removed_listener_gets_nothing() {
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, OK);
    let listener: Arc<dyn StreamListener> = events.clone();
    assert!(reader.remove_listener(&listener));

    read_all(&mut reader);
    assert!(events.is_empty());
}

#[test]
fn test_overlong_status_line_is_contained() {
    let data = vec![b'A'; 10_000];
    let conn = connection(80);
    let (mut reader, events) = reader(&conn, data.as_slice());

    assert_eq!(read_all(&mut reader), data);
    assert!(events.is_empty());
    assert_eq!(
        reader.parser().last_error().map(|e| &e.kind),
        Some(&h1stream::ParseErrorKind::StatusLineTooLong)
    );
}

// =========================================================================
// Request observation
// =========================================================================

#[test]
fn test_writer_skips_content_length_bodies() {
    let conn = connection(8080);
    let mut writer = conn.writer(Limited {
        out: Vec::new(),
        max: 5,
    });
    let first = b"POST /upload HTTP/1.1\r\nHost: files\r\nContent-Length: 11\r\n\r\nhello world";
    let second = b"GET /after HTTP/1.1\r\nHost: files\r\n\r\n";
    writer.write_all(first).unwrap();
    writer.write_all(second).unwrap();

    assert_eq!(writer.get_ref().out, [first.as_slice(), second.as_slice()].concat());
    assert_eq!(writer.state(), RequestState::Head);

    let shells: Vec<_> = std::iter::from_fn(|| conn.cache().dequeue(conn.id())).collect();
    assert_eq!(shells.len(), 2);
    assert_eq!(shells[0].method(), Some(&Method::POST));
    assert_eq!(shells[0].host(), Some("files"));
    assert_eq!(shells[0].bytes_sent(), first.len() as u64);
    assert_eq!(shells[0].port(), Some(8080));
    assert!(shells[0].request_start().is_some());
    assert_eq!(shells[1].uri().map(|u| u.path()), Some("/after"));
}

#[test]
fn test_writer_stops_at_chunked_body() {
    let conn = connection(80);
    let mut writer = conn.writer(Vec::new());
    writer
        .write_all(b"POST /s HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n")
        .unwrap();
    writer.write_all(b"GET /ignored HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(writer.state(), RequestState::Disabled);
    assert_eq!(conn.cache().pending_len(conn.id()), 1);
}

#[test]
fn test_writer_stops_at_oversized_head() {
    let cache = Arc::new(TransactionsCache::new());
    let config = InstrumentConfig {
        max_request_head: 64,
        ..Default::default()
    };
    let conn = Arc::new(
        MonitoredConnection::new(ConnectionId(3), 80, cache).with_config(Arc::new(config)),
    );
    let mut writer = conn.writer(Vec::new());
    let cookie = "a".repeat(200);
    let request = format!("GET / HTTP/1.1\r\nCookie: {cookie}\r\n\r\n");
    writer.write_all(request.as_bytes()).unwrap();

    assert_eq!(writer.state(), RequestState::Disabled);
    assert!(conn.cache().is_empty());
    assert_eq!(writer.get_ref(), &request.into_bytes());
}

#[test]
fn test_writer_stops_at_malformed_head() {
    let conn = connection(80);
    let mut writer = conn.writer(Vec::new());
    writer.write_all(b"\x16\x03\x01 binary\r\n\r\n").unwrap();
    assert_eq!(writer.state(), RequestState::Disabled);
}

#[test]
fn test_write_error_is_published_and_returned() {
    let conn = connection(80);
    let events = Arc::new(EventCollector::new());
    let mut writer = conn.writer(Broken);
    writer.add_listener(events.clone());

    let err = writer.write(b"GET / HTTP/1.1\r\n\r\n").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    let err = writer.flush().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    let events = events.drain();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(StreamEvent::is_error));
    assert!(conn.cache().is_empty());
}

#[test]
fn test_split_registers_listener_on_both_halves() {
    let conn = connection(80);
    let events = Arc::new(EventCollector::new());
    let (mut reader, mut writer) = conn.split(OK, Broken, events.clone());

    let _ = writer.write(b"x");
    read_all(&mut reader);
    assert_eq!(events.len(), 2);
}

#[test]
fn test_parser_resumes_at_status_line_between_responses() {
    let conn = connection(80);
    let (mut reader, _events) = reader(&conn, OK);
    let mut buf = [0u8; 64];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(n, OK.len());
    assert_eq!(reader.parser().state(), &ParserState::StatusLine);
}

// =========================================================================
// Async decoration
// =========================================================================

#[cfg(feature = "tokio")]
#[tokio::test]
async fn test_async_reader_records_transactions() {
    use tokio::io::AsyncReadExt;

    let conn = connection(80);
    send_requests(&conn, &[b"GET /a HTTP/1.1\r\nHost: h\r\n\r\n".as_slice()]);
    let data = [OK, CHUNKED].concat();
    let (mut reader, events) = reader(&conn, data.as_slice());

    let mut out = Vec::new();
    AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap();
    assert_eq!(out, data);

    let events = events.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].transaction().uri().map(|u| u.path()), Some("/a"));
    assert!(events[1].transaction().socket_reuse());
}
