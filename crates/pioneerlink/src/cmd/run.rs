use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pioneerlink_device::{
    Clock, Link, LinkError, LoggingControl, Measurement, Publisher, SystemClock,
};
use pioneerlink_transport::{HealthSink, HealthState};
use tracing::{info, warn};

use crate::cmd::RunArgs;
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_measurement, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    if args.heartbeat_ms == 0 {
        return Err(CliError::new(USAGE, "--heartbeat-ms must be greater than 0"));
    }
    let config = args.link.resolve()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<Measurement>();
    let publisher: Arc<dyn Publisher> =
        Arc::new(move |m: Measurement| -> pioneerlink_device::Result<()> {
            tx.send(m)
                .map_err(|err| LinkError::Publish(err.to_string()))
        });
    let health: Arc<dyn HealthSink> = Arc::new(|state: HealthState| match state {
        HealthState::Active => info!("link active"),
        HealthState::CommunicationError => warn!("link communication error"),
    });

    let mut link =
        Link::acquire(config, publisher, health).map_err(|err| link_error("link failed", err))?;

    if let Some(dir) = &args.log_dir {
        link.on_logging_control(&LoggingControl::Started {
            folder: dir.clone(),
        })
        .map_err(|err| link_error("raw logging failed", err))?;
    }

    let clock = SystemClock;
    let period = Duration::from_millis(args.heartbeat_ms);
    let mut next_beat = Instant::now() + period;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let wait = next_beat.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(measurement) => {
                print_measurement(&measurement, clock.epoch_ms(), format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                link.on_heartbeat();
                next_beat += period;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if args.log_dir.is_some() {
        stop_logging(&link);
    }
    link.release();
    info!(printed, "link released");
    Ok(SUCCESS)
}

fn stop_logging(link: &Link) {
    if let Err(err) = link.on_logging_control(&LoggingControl::Stopped) {
        warn!(error = %err, "raw logging stop failed");
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
