use clap::Parser;
use log::{error, info};
use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use sweep_driver::{ConnectionMode, PortConfig, ScanFrame, SerialConnector, Session, SweepError};

/// Reads revolutions from a Sweep and prints them as JSON lines.
#[derive(Parser, Debug)]
#[command(about, disable_version_flag = true)]
struct Args {
    /// The device path to a serial port. Auto-detected when omitted.
    port: Option<String>,
    #[arg(long, default_value_t = sweep_data::DEFAULT_BAUD_RATE)]
    baudrate: u32,
    /// Command response timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout: u64,
    /// Motor speed in Hz to set before scanning.
    #[arg(long)]
    motor_speed: Option<i32>,
    /// Number of revolutions to read.
    #[arg(short = 'n', long, default_value_t = 10)]
    scans: usize,
    /// Per-revolution timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    scan_timeout: u64,
}

fn connection_mode(args: &Args) -> ConnectionMode {
    match &args.port {
        Some(port) => {
            PortConfig::new(port.as_str(), args.baudrate, Duration::from_millis(args.timeout)).into()
        }
        None => ConnectionMode::AutoDetect,
    }
}

fn run(args: Args) -> Result<(), SweepError> {
    let mut session = Session::open(&SerialConnector, connection_mode(&args))?;
    if let Some(hz) = args.motor_speed {
        session.set_motor_speed(hz)?;
    }
    info!(
        "Motor at {} Hz, sampling at {} Hz",
        session.get_motor_speed()?,
        session.get_sample_rate()?
    );
    session.start_scanning()?;

    let failure: Rc<RefCell<Option<SweepError>>> = Rc::default();
    for _ in 0..args.scans {
        let sink = Rc::clone(&failure);
        session.scan(Duration::from_millis(args.scan_timeout), move |result| match result {
            Ok(frame) => print_frame(&frame),
            Err(e) => *sink.borrow_mut() = Some(e),
        })?;
        session.wait_for_scan();
        if let Some(e) = failure.borrow_mut().take() {
            error!("{}", e);
            break;
        }
    }

    session.stop_scanning()?;
    session.close();
    Ok(())
}

fn print_frame(frame: &ScanFrame) {
    match serde_json::to_string(frame) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("{}", e),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
