use rtos_logger::{log_locked, log_printf, log_printf_time};
use rtos_logger::{
    ClockState, Logger, LoggerConfig, LoggerError, LoggerState, SerialDevice, SerialWriter,
    WallClock, QUEUE_REJECTED_CODE,
};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// 2023-11-14 22:13:20 UTC
const FIXED_SECONDS: i64 = 1_700_000_000;

struct FixedWallClock;

impl WallClock for FixedWallClock {
    fn unix_seconds(&self) -> i64 {
        FIXED_SECONDS
    }
}

#[derive(Clone, Default)]
struct SharedDevice {
    data: Arc<Mutex<Vec<u8>>>,
    baud: Arc<Mutex<Option<u32>>>,
    flushes: Arc<AtomicUsize>,
    write_delay: Option<Duration>,
}

impl SharedDevice {
    fn slow(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Self::default()
        }
    }

    fn text(&self) -> String {
        String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
    }

    fn lines(&self) -> Vec<String> {
        self.text().split_terminator('\n').map(str::to_string).collect()
    }
}

impl SerialDevice for SharedDevice {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(delay) = self.write_delay {
            thread::sleep(delay);
        }
        self.data.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn set_baud_rate(&mut self, baud: u32) {
        *self.baud.lock().unwrap() = Some(baud);
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Holds every write until `open` is called.
#[derive(Clone, Default)]
struct GatedDevice {
    data: Arc<Mutex<Vec<u8>>>,
    gate: Arc<(Mutex<bool>, Condvar)>,
    started: Arc<AtomicUsize>,
}

impl GatedDevice {
    fn open(&self) {
        let (open, cvar) = &*self.gate;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }
}

impl SerialDevice for GatedDevice {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let (open, cvar) = &*self.gate;
        let mut is_open = open.lock().unwrap();
        while !*is_open {
            is_open = cvar.wait(is_open).unwrap();
        }
        self.data.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }
}

struct Broken;

impl fmt::Display for Broken {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }
}

fn build_logger(config: LoggerConfig, device: &SharedDevice) -> Logger {
    let clock = Arc::new(ClockState::with_wall_clock(FixedWallClock));
    Logger::new(config, clock, SerialWriter::new(device.clone())).unwrap()
}

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "Timed out waiting for the consumer");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_capacity_two_without_consumer() {
    let device = SharedDevice::default();
    let logger = build_logger(LoggerConfig::default().with_queue_capacity(2), &device);

    assert_eq!(log_printf!(logger, "a").unwrap(), 1);
    assert_eq!(log_printf!(logger, "b").unwrap(), 1);

    let err = log_printf!(logger, "c").unwrap_err();
    assert!(matches!(err, LoggerError::QueueRejected));
    assert_eq!(err.code(), QUEUE_REJECTED_CODE);

    assert_eq!(logger.state(), LoggerState::Constructed);
    assert_eq!(logger.log_queue().len(), 2);
    assert!(device.text().is_empty(), "Nothing is written before init");
}

#[test]
fn test_queued_lines_delivered_after_init() {
    let device = SharedDevice::default();
    let logger = build_logger(LoggerConfig::default().with_queue_capacity(8), &device);

    log_printf!(logger, "early 1\n").unwrap();
    log_printf!(logger, "early 2\n").unwrap();
    logger.init().unwrap();
    log_printf!(logger, "late\n").unwrap();

    wait_for(|| device.lines().len() == 4);
    let lines = device.lines();
    assert_eq!(lines[0], "early 1");
    assert_eq!(lines[1], "early 2");
    assert!(lines[2].contains("[INFO][RTOS-LOGGER]"));
    assert_eq!(lines[3], "late");
}

#[test]
fn test_readiness_line() {
    let device = SharedDevice::default();
    let config = LoggerConfig::default()
        .with_stack_size(64 * 1024)
        .with_queue_capacity(16);
    let logger = build_logger(config, &device);

    logger.init().unwrap();
    assert_eq!(logger.state(), LoggerState::Running);
    assert_eq!(logger.config().queue_capacity, 16);

    wait_for(|| !device.text().is_empty());
    let text = device.text();
    assert!(text.starts_with("2023-11-14 22:13:20."), "Missing timestamp: {:?}", text);
    assert!(text.contains("[INFO][RTOS-LOGGER] RTOS logger task thread (TID: "));
    assert!(text.ends_with(
        "started with a stack size of 65536, queue size of 16 ... [OK] \r\n"
    ));
}

#[test]
fn test_second_init_is_rejected() {
    let device = SharedDevice::default();
    let logger = build_logger(LoggerConfig::default(), &device);

    logger.init().unwrap();
    let err = logger.init().unwrap_err();
    assert!(matches!(err, LoggerError::AlreadyInitialized));

    logger.flush().unwrap();
    wait_for(|| device.flushes.load(Ordering::SeqCst) == 1);
    let readiness = device.text().matches("[INFO][RTOS-LOGGER]").count();
    assert_eq!(readiness, 1, "Only one consumer may announce itself");
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_start_degrades() {
    let device = SharedDevice::default();
    // Larger than the user address space, so the stack cannot be mapped.
    let config = LoggerConfig::default().with_stack_size(1 << 50);
    let logger = build_logger(config, &device);

    let err = logger.init().unwrap_err();
    assert!(matches!(err, LoggerError::Startup(_)));
    assert_eq!(err.code(), 1);
    assert_eq!(logger.state(), LoggerState::Degraded);
    // The readiness line is still attempted.
    assert_eq!(logger.log_queue().len(), 1);

    assert!(matches!(logger.init(), Err(LoggerError::AlreadyInitialized)));
}

#[test]
fn test_printf_time_prefix() {
    let device = SharedDevice::default();
    let config = LoggerConfig::default().with_timezone_offset(3600);
    let logger = build_logger(config, &device);

    let len = log_printf_time!(logger, "{}\n", "x").unwrap();
    assert_eq!(len, 2, "Length covers only the message body");

    let queued = logger.log_queue().try_dequeue().unwrap();
    let line = queued.message.as_str();
    assert_eq!(&line[..20], "2023-11-14 23:13:20.");
    assert!(line[20..23].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(&line[23..], " x\n");
    assert_eq!(queued.message.body(), "x\n");
}

#[test]
fn test_format_error_enqueues_nothing() {
    let device = SharedDevice::default();
    let logger = build_logger(LoggerConfig::default(), &device);

    let err = log_printf!(logger, "value={}", Broken).unwrap_err();
    assert!(matches!(err, LoggerError::Format(_)));
    assert!(err.code() < 0);
    assert_ne!(err.code(), QUEUE_REJECTED_CODE);

    assert!(log_printf_time!(logger, "value={}", Broken).is_err());
    assert!(logger.log_queue().is_empty());
}

#[test]
fn test_fifo_from_many_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 50;

    let device = SharedDevice::default();
    let logger = Arc::new(build_logger(LoggerConfig::default().with_queue_capacity(512), &device));
    logger.init().unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    log_printf!(logger, "{}:{}\n", p, seq).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    // Readiness line plus every producer line.
    wait_for(|| device.lines().len() == PRODUCERS * PER_PRODUCER + 1);

    let mut next_seq = [0usize; PRODUCERS];
    for line in device.lines().iter().filter(|l| !l.contains("RTOS-LOGGER")) {
        let (p, seq) = line.split_once(':').unwrap();
        let p: usize = p.parse().unwrap();
        assert_eq!(seq.parse::<usize>().unwrap(), next_seq[p]);
        next_seq[p] += 1;
    }
}

#[test]
fn test_locked_and_async_paths_keep_lines_whole() {
    const LINES: usize = 100;

    let device = SharedDevice::default();
    let logger = Arc::new(build_logger(LoggerConfig::default().with_queue_capacity(256), &device));
    logger.init().unwrap();

    let async_producer = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            for _ in 0..LINES {
                log_printf!(logger, "{}\n", "A".repeat(40)).unwrap();
            }
        })
    };
    let locked_producer = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            for _ in 0..LINES {
                log_locked!(logger, "{}{}{}\n", "BBBBBBBB", "BBBBBBBB", "BBBBBBBB");
            }
        })
    };
    async_producer.join().unwrap();
    locked_producer.join().unwrap();

    wait_for(|| device.lines().len() == 2 * LINES + 1);
    for line in device.lines().iter().filter(|l| !l.contains("RTOS-LOGGER")) {
        let first = line.chars().next().unwrap();
        assert!(line.chars().all(|c| c == first), "Interleaved line: {:?}", line);
    }
}

#[test]
fn test_drop_with_pending_lines() {
    const QUEUED: usize = 200;

    let device = SharedDevice::slow(Duration::from_millis(1));
    let logger = build_logger(LoggerConfig::default().with_queue_capacity(QUEUED), &device);
    logger.init().unwrap();
    for i in 0..QUEUED - 1 {
        log_printf!(logger, "{}\n", i).unwrap();
    }

    drop(logger);

    let delivered_at_drop = device.lines();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(device.lines(), delivered_at_drop, "Consumer kept running after drop");

    let seen: Vec<usize> = delivered_at_drop
        .iter()
        .filter(|l| !l.contains("RTOS-LOGGER"))
        .map(|l| l.parse().unwrap())
        .collect();
    let unique: HashSet<usize> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "A line was delivered twice");
    assert_eq!(seen, (0..QUEUED - 1).collect::<Vec<_>>(), "Queued lines lost at teardown");
}

#[test]
fn test_drop_runs_lines_queued_behind_a_stuck_write() {
    let device = GatedDevice::default();
    let clock = Arc::new(ClockState::with_wall_clock(FixedWallClock));
    let logger = Logger::new(LoggerConfig::default(), clock, SerialWriter::new(device.clone())).unwrap();
    logger.init().unwrap();

    // The consumer is now blocked writing the readiness line.
    wait_for(|| device.started.load(Ordering::SeqCst) == 1);
    for i in 0..3 {
        log_printf!(logger, "queued {}\n", i).unwrap();
    }

    let dropper = thread::spawn(move || drop(logger));
    thread::sleep(Duration::from_millis(50));
    device.open();
    dropper.join().unwrap();

    let text = String::from_utf8(device.data.lock().unwrap().clone()).unwrap();
    let queued: Vec<&str> = text
        .split_terminator('\n')
        .filter(|l| l.starts_with("queued"))
        .collect();
    assert_eq!(queued, vec!["queued 0", "queued 1", "queued 2"]);
}

#[test]
fn test_drop_without_init() {
    let device = SharedDevice::default();
    let logger = build_logger(LoggerConfig::default(), &device);
    log_printf!(logger, "never written\n").unwrap();
    drop(logger);
    assert!(device.text().is_empty());
}

#[test]
fn test_fast_uart_flag() {
    let fast = SharedDevice::default();
    let _logger = build_logger(LoggerConfig::default(), &fast);
    assert_eq!(*fast.baud.lock().unwrap(), Some(115_200));

    let slow = SharedDevice::default();
    let _logger = build_logger(LoggerConfig::default().with_fast_uart(false), &slow);
    assert_eq!(*slow.baud.lock().unwrap(), None);
}

#[test]
fn test_invalid_config_rejected() {
    let device = SharedDevice::default();
    let clock = Arc::new(ClockState::new());
    let result = Logger::new(
        LoggerConfig::default().with_queue_capacity(0),
        clock,
        SerialWriter::new(device),
    );
    assert!(matches!(result, Err(LoggerError::InvalidConfig(_))));
}

#[test]
fn test_loggers_share_device_lock() {
    let device = SharedDevice::default();
    let clock = Arc::new(ClockState::with_wall_clock(FixedWallClock));
    let writer = SerialWriter::new(device.clone());

    let first = Logger::new(LoggerConfig::default(), Arc::clone(&clock), writer.clone()).unwrap();
    let second = Logger::new(LoggerConfig::default(), clock, writer).unwrap();
    assert!(first.writer().same_device(second.writer()));

    log_locked!(first, "one\n");
    log_locked!(second, "two\n");
    assert_eq!(device.lines(), vec!["one", "two"]);
}
