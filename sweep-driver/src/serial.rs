use crate::constants::{CMD_TERMINATOR, POLL_INTERVAL_MS};
use crate::error::DriverError;
use crate::numeric::to_string;
use crate::time::sleep_ms;
use log::trace;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

fn send_data(port: &mut Box<dyn SerialPort>, data: &[u8]) -> Result<(), DriverError> {
    trace!("-> {}", to_string(data));
    port.write_all(data)?;
    port.flush()?;
    Ok(())
}

pub(crate) fn send_command(port: &mut Box<dyn SerialPort>, command: [u8; 2]) -> Result<(), DriverError> {
    send_data(port, &[command[0], command[1], CMD_TERMINATOR])
}

pub(crate) fn send_param_command(
    port: &mut Box<dyn SerialPort>,
    command: [u8; 2],
    param: [u8; 2],
) -> Result<(), DriverError> {
    send_data(port, &[command[0], command[1], param[0], param[1], CMD_TERMINATOR])
}

pub(crate) fn get_n_read(port: &mut Box<dyn SerialPort>) -> Result<usize, DriverError> {
    let n_u32: u32 = port.bytes_to_read()?;
    Ok(n_u32.try_into().unwrap_or(0))
}

pub(crate) fn flush(port: &mut Box<dyn SerialPort>) -> Result<(), DriverError> {
    let n_read: usize = get_n_read(port).unwrap_or(0);
    if n_read == 0 {
        return Ok(());
    }
    let mut discarded: Vec<u8> = vec![0; n_read];
    port.read_exact(discarded.as_mut_slice())?;
    trace!("flushed {} bytes", n_read);
    Ok(())
}

/// Reads exactly `data_size` bytes, giving up once `deadline` has passed.
///
/// Returns `Ok(None)` on timeout so callers can decide how to classify it.
pub(crate) fn read_until(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
    deadline: Instant,
) -> Result<Option<Vec<u8>>, DriverError> {
    assert!(data_size > 0);
    loop {
        if get_n_read(port)? >= data_size {
            let mut packet: Vec<u8> = vec![0; data_size];
            port.read_exact(packet.as_mut_slice())?;
            trace!("<- {}", to_string(&packet));
            return Ok(Some(packet));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep_ms(POLL_INTERVAL_MS);
    }
}

/// Reads a command response; a missing answer is a transport fault.
pub(crate) fn read(
    port: &mut Box<dyn SerialPort>,
    data_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>, DriverError> {
    read_until(port, data_size, Instant::now() + timeout)?.ok_or_else(|| {
        DriverError::transport(format!(
            "timed out after {} ms waiting for a {} byte response",
            timeout.as_millis(),
            data_size
        ))
    })
}
