use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bgserial_link::{BackgroundSerial, LinkConfig, LinkError, LinkState};
use bgserial_transport::{MemoryTransport, Transport};

const WAIT: Duration = Duration::from_secs(5);

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn read_lines(link: &BackgroundSerial, count: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let found = wait_until(|| {
        while let Some(line) = link.try_read_line().expect("link should not be fatal") {
            lines.push(line);
        }
        lines.len() >= count
    });
    assert!(found, "expected {count} lines, got {lines:?}");
    lines
}

fn started(script: &MemoryTransport) -> BackgroundSerial {
    let link = BackgroundSerial::new(script.clone());
    link.start().expect("start should succeed");
    link
}

#[test]
fn reader_thread_delivers_lines_and_messages() {
    let script = MemoryTransport::new("mem");
    let link = started(&script);

    script.push_inbound(b"D:low battery\nV:{}\n");

    assert_eq!(read_lines(&link, 1), vec!["V:{}"]);
    assert!(wait_until(|| link.pending_messages() == 1));
    assert_eq!(
        link.try_read_message().unwrap().as_deref(),
        Some("low battery")
    );
}

#[test]
fn arrival_order_is_preserved_across_chunks() {
    let script = MemoryTransport::new("mem");
    let link = started(&script);

    let mut expected = Vec::new();
    for i in 0..50 {
        let line = format!("L:{i}");
        let (head, tail) = line.split_at(2);
        script.push_inbound(head);
        script.push_inbound(format!("{tail}\n"));
        expected.push(line);
    }

    assert_eq!(read_lines(&link, 50), expected);
}

#[test]
fn transient_read_failure_recovers_and_resumes() {
    let script = MemoryTransport::new("mem");
    let link = started(&script);

    script.push_inbound(b"before\n");
    assert_eq!(read_lines(&link, 1), vec!["before"]);

    script.fail_next_reads(1);
    assert!(wait_until(|| script.open_count() == 1));
    assert!(wait_until(|| link.state() == LinkState::Normal));

    script.push_inbound(b"after\n");
    assert_eq!(read_lines(&link, 1), vec!["after"]);
    assert!(link.is_running());
}

#[test]
fn failed_reopen_turns_fatal_and_stops_reader() {
    let script = MemoryTransport::new("mem");
    let link = started(&script);

    script.fail_next_opens(usize::MAX);
    script.fail_next_reads(1);

    assert!(wait_until(|| link.state() == LinkState::Fatal));
    assert!(wait_until(|| !link.is_running()));

    match link.try_read_line() {
        Err(LinkError::Fatal { reason }) => {
            assert!(reason.contains("lost serial connection"), "{reason}")
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
    assert!(link.write(b"v").unwrap_err().is_fatal());
    assert!(!script.is_open());
}

#[test]
fn stop_prevents_further_reads() {
    let script = MemoryTransport::new("mem");
    let link = started(&script);

    link.stop();
    thread::sleep(Duration::from_millis(100));
    script.push_inbound(b"ignored\n");
    thread::sleep(Duration::from_millis(100));

    assert_eq!(link.try_read_line().unwrap(), None);
    assert_eq!(script.pending_inbound(), 1);

    link.start().unwrap();
    assert_eq!(read_lines(&link, 1), vec!["ignored"]);
}

#[test]
fn concurrent_writers_and_reader() {
    let script = MemoryTransport::new("mem");
    let config = LinkConfig {
        poll_interval: Duration::from_millis(1),
        ..LinkConfig::default()
    };
    let link = Arc::new(BackgroundSerial::with_config(script.clone(), config));
    link.start().unwrap();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let link = Arc::clone(&link);
            thread::spawn(move || {
                (0..25)
                    .map(|_| link.writeln("v").unwrap())
                    .sum::<usize>()
            })
        })
        .collect();

    let total: usize = writers.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 4 * 25 * 2);
    assert_eq!(script.written().len(), total);
    assert_eq!(link.state(), LinkState::Normal);
}

#[test]
fn timeout_failure_at_start_recovers_on_first_iteration() {
    let script = MemoryTransport::new("mem");
    script.fail_next_set_timeouts(1);
    let link = started(&script);

    assert!(wait_until(|| script.open_count() == 1));
    assert!(wait_until(|| link.state() == LinkState::Normal));
    assert_eq!(script.take_written(), b"\n");

    script.push_inbound(b"ready\n");
    assert_eq!(read_lines(&link, 1), vec!["ready"]);
}

#[test]
fn timeout_failure_at_start_turns_fatal_when_reopen_fails() {
    let script = MemoryTransport::new("mem");
    script.fail_next_set_timeouts(1);
    script.fail_next_opens(usize::MAX);
    let link = started(&script);

    assert!(wait_until(|| link.state() == LinkState::Fatal));
    assert!(wait_until(|| !link.is_running()));
    assert!(matches!(
        link.try_read_line(),
        Err(LinkError::Fatal { .. })
    ));
    assert!(!script.is_open());
}
