use std::sync::Arc;
use std::thread;

use rtos_logger::{log_locked, log_printf, log_printf_time};
use rtos_logger::{ClockState, Logger, LoggerConfig, LoggerError, SerialWriter, StdoutDevice};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const PRODUCERS: usize = 4;
const LINES_PER_PRODUCER: usize = 8;

fn main() -> Result<(), LoggerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let clock = Arc::new(ClockState::new());
    let writer = SerialWriter::new(StdoutDevice);
    let logger = Arc::new(Logger::new(LoggerConfig::default(), clock, writer)?);
    logger.init()?;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for line in 0..LINES_PER_PRODUCER {
                    if let Err(err) = log_printf_time!(logger, "[task {}] line {}\r\n", id, line) {
                        warn!(code = err.code(), "line dropped");
                    }
                }
                log_locked!(logger, "[task {}] done\r\n", id);
            })
        })
        .collect();

    for producer in producers {
        if producer.join().is_err() {
            warn!("producer thread panicked");
        }
    }

    log_printf!(logger, "all producers finished\r\n")?;
    logger.flush()?;
    Ok(())
}
