use crate::constants::{
    CMD_MOTOR_INFO, CMD_RESET, CMD_SAMPLE_RATE_INFO, CMD_SET_MOTOR_SPEED, CMD_START_SCANNING,
    CMD_STOP_SCANNING, RESPONSE_HEADER_SIZE, RESPONSE_INFO_SIZE, RESPONSE_PARAM_SIZE,
    SCAN_PACKET_SIZE, STOP_SETTLE_MS,
};
use crate::device::{Connector, Device, RawScan};
use crate::error::DriverError;
use crate::numeric::{ascii_to_int, int_to_ascii, to_string};
use crate::packet::{
    parse_info_response, parse_scan_packet, validate_param_response, validate_response_header,
    ScanPacket,
};
use crate::serial::{flush, read, read_until, send_command, send_param_command};
use crate::time::sleep_ms;
use log::{debug, warn};
use serialport::{SerialPort, SerialPortType};
use std::time::{Duration, Instant};
use sweep_data::{DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_TIMEOUT};

/// Opens Sweep devices on serial ports.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl SerialConnector {
    fn candidate_ports() -> Vec<String> {
        let mut ports = vec![DEFAULT_PORT.to_owned()];
        match serialport::available_ports() {
            Ok(available) => ports.extend(
                available
                    .into_iter()
                    .filter(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
                    .map(|p| p.port_name)
                    .filter(|name| name != DEFAULT_PORT),
            ),
            Err(e) => debug!("Unable to enumerate serial ports: {}", e),
        }
        ports
    }
}

impl Connector for SerialConnector {
    fn construct_simple(&self) -> Result<Box<dyn Device>, DriverError> {
        let mut last_error = DriverError::transport("no serial port found");
        for port in SerialConnector::candidate_ports() {
            match SerialDevice::open(&port, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT) {
                Ok(device) => return Ok(Box::new(device)),
                Err(e) => {
                    debug!("Probing \"{}\" failed: {}", port, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn construct(
        &self,
        port: &str,
        baudrate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn Device>, DriverError> {
        Ok(Box::new(SerialDevice::open(port, baudrate, timeout)?))
    }
}

/// A Sweep attached to a serial port.
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    // samples of the revolution currently being received
    partial: Vec<ScanPacket>,
    synced: bool,
}

/// Packets of one revolution, converted on access.
struct SweepScan {
    packets: Vec<ScanPacket>,
}

impl RawScan for SweepScan {
    fn sample_count(&self) -> usize {
        self.packets.len()
    }

    fn angle(&self, index: usize) -> f64 {
        self.packets[index].angle()
    }

    fn distance(&self, index: usize) -> f64 {
        self.packets[index].distance()
    }
}

impl SerialDevice {
    /// Opens `port_name` and brings the device to a known, non-scanning state.
    pub fn open(port_name: &str, baudrate: u32, timeout: Duration) -> Result<SerialDevice, DriverError> {
        let port = serialport::new(port_name, baudrate)
            .timeout(timeout)
            .open()
            .map_err(|e| DriverError::transport(format!("failed to open \"{}\": {}", port_name, e)))?;
        let mut device = SerialDevice::with_port(port, timeout);
        device.stop_scanning()?;
        debug!("Opened \"{}\" at {} baud", port_name, baudrate);
        Ok(device)
    }

    pub(crate) fn with_port(port: Box<dyn SerialPort>, timeout: Duration) -> SerialDevice {
        SerialDevice {
            port,
            timeout,
            partial: Vec::new(),
            synced: false,
        }
    }

    fn info(&mut self, command: [u8; 2]) -> Result<[u8; 2], DriverError> {
        send_command(&mut self.port, command)?;
        let response = read(&mut self.port, RESPONSE_INFO_SIZE, self.timeout)?;
        parse_info_response(&response, command)
    }

    fn take_frame(&mut self, first: ScanPacket) -> Box<dyn RawScan + Send> {
        let packets = std::mem::replace(&mut self.partial, vec![first]);
        Box::new(SweepScan { packets })
    }
}

impl Device for SerialDevice {
    fn start_scanning(&mut self) -> Result<(), DriverError> {
        send_command(&mut self.port, CMD_START_SCANNING)?;
        let header = read(&mut self.port, RESPONSE_HEADER_SIZE, self.timeout)?;
        validate_response_header(&header, CMD_START_SCANNING)?;
        self.partial.clear();
        self.synced = false;
        Ok(())
    }

    fn stop_scanning(&mut self) -> Result<(), DriverError> {
        // Scan packets may still be in flight, so drain them before reading
        // the acknowledgement of a second stop.
        send_command(&mut self.port, CMD_STOP_SCANNING)?;
        sleep_ms(STOP_SETTLE_MS);
        flush(&mut self.port)?;
        send_command(&mut self.port, CMD_STOP_SCANNING)?;
        let header = read(&mut self.port, RESPONSE_HEADER_SIZE, self.timeout)?;
        validate_response_header(&header, CMD_STOP_SCANNING)?;
        self.partial.clear();
        self.synced = false;
        Ok(())
    }

    fn get_scan(&mut self, timeout: Duration) -> Result<Box<dyn RawScan + Send>, DriverError> {
        let deadline = Instant::now() + timeout;
        let mut bytes = Vec::with_capacity(SCAN_PACKET_SIZE);
        loop {
            match read_until(&mut self.port, SCAN_PACKET_SIZE - bytes.len(), deadline)? {
                Some(more) => bytes.extend(more),
                None => {
                    return Err(DriverError::timeout(format!(
                        "no complete revolution within {} ms",
                        timeout.as_millis()
                    )))
                }
            }
            let packet = match parse_scan_packet(&bytes) {
                Ok(packet) => {
                    bytes.clear();
                    packet
                }
                Err(e) => {
                    // slide by one byte until packets line up again
                    warn!("Dropping scan byte {:02X}: {}", bytes[0], e);
                    bytes.remove(0);
                    continue;
                }
            };
            if packet.has_error() {
                warn!(
                    "Dropping scan packet with error flags {:#04X} (signal strength {})",
                    packet.sync_error, packet.signal_strength
                );
                continue;
            }
            if packet.is_sync() {
                if self.synced {
                    return Ok(self.take_frame(packet));
                }
                self.synced = true;
                self.partial.clear();
            }
            if self.synced {
                self.partial.push(packet);
            }
        }
    }

    fn get_motor_speed(&mut self) -> Result<i32, DriverError> {
        let digits = self.info(CMD_MOTOR_INFO)?;
        ascii_to_int(digits).ok_or_else(|| {
            DriverError::transport(format!("invalid motor speed {}", to_string(&digits)))
        })
    }

    fn set_motor_speed(&mut self, hz: i32) -> Result<(), DriverError> {
        let param = int_to_ascii(hz)
            .ok_or_else(|| DriverError::rejected(format!("motor speed {} Hz is not encodable", hz)))?;
        send_param_command(&mut self.port, CMD_SET_MOTOR_SPEED, param)?;
        let response = read(&mut self.port, RESPONSE_PARAM_SIZE, self.timeout)?;
        validate_param_response(&response, CMD_SET_MOTOR_SPEED, param)
    }

    fn get_sample_rate(&mut self) -> Result<i32, DriverError> {
        let code = self.info(CMD_SAMPLE_RATE_INFO)?;
        match &code {
            b"01" => Ok(500),
            b"02" => Ok(750),
            b"03" => Ok(1000),
            _ => Err(DriverError::transport(format!(
                "invalid sample rate code {}",
                to_string(&code)
            ))),
        }
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        send_command(&mut self.port, CMD_RESET)?;
        self.partial.clear();
        self.synced = false;
        Ok(())
    }

    fn destruct(&mut self) {
        if let Err(e) = self.stop_scanning() {
            warn!("Failed to stop scanning while closing the device: {}", e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::packet::encode_scan_packet;
    use serialport::TTYPort;
    use std::io::{Read, Write};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn device_pair() -> (TTYPort, SerialDevice) {
        let (master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let device = SerialDevice::with_port(Box::new(slave), TIMEOUT);
        (master, device)
    }

    #[test]
    fn test_start_scanning() {
        let (mut master, mut device) = device_pair();
        master.write_all(b"DS00P\n").unwrap();
        sleep_ms(10);

        device.start_scanning().unwrap();

        let mut buf = [0u8; 3];
        master.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"DS\n");
    }

    #[test]
    fn test_start_scanning_rejected() {
        let (mut master, mut device) = device_pair();
        master.write_all(b"DS13T\n").unwrap();
        sleep_ms(10);

        let err = device.start_scanning().unwrap_err();
        assert_eq!(err.kind(), crate::error::DriverErrorKind::Rejected);
        assert_eq!(err.message(), "DS: motor is stationary (status 13)");
    }

    #[test]
    fn test_motor_speed() {
        let (mut master, mut device) = device_pair();
        master.write_all(b"MZ05\n").unwrap();
        sleep_ms(10);
        assert_eq!(device.get_motor_speed().unwrap(), 5);

        master.write_all(b"MS07\n00P\n").unwrap();
        sleep_ms(10);
        device.set_motor_speed(7).unwrap();

        let mut buf = [0u8; 8];
        master.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"MZ\nMS07\n");
    }

    #[test]
    fn test_sample_rate() {
        let (mut master, mut device) = device_pair();
        master.write_all(b"LI02\n").unwrap();
        sleep_ms(10);
        assert_eq!(device.get_sample_rate().unwrap(), 750);
    }

    #[test]
    fn test_get_scan_between_sync_packets() {
        let (mut master, mut device) = device_pair();
        let mut stream = Vec::new();
        // tail of a previous revolution is skipped
        stream.extend(encode_scan_packet(false, 16 * 350, 90));
        stream.extend(encode_scan_packet(true, 0, 100));
        stream.extend(encode_scan_packet(false, 16 * 120, 200));
        let mut corrupted = encode_scan_packet(false, 16 * 180, 250);
        corrupted[6] ^= 0x01;
        stream.extend(corrupted);
        stream.extend(encode_scan_packet(false, 16 * 240, 300));
        stream.extend(encode_scan_packet(true, 8, 110));
        master.write_all(&stream).unwrap();
        sleep_ms(10);

        let scan = device.get_scan(TIMEOUT).unwrap();
        assert_eq!(scan.sample_count(), 3);
        assert_eq!(
            (0..3).map(|i| scan.angle(i)).collect::<Vec<_>>(),
            vec![0., 120., 240.]
        );
        assert_eq!(
            (0..3).map(|i| scan.distance(i)).collect::<Vec<_>>(),
            vec![100., 200., 300.]
        );

        // the sync packet that closed the frame opens the next one
        let mut stream = Vec::new();
        stream.extend(encode_scan_packet(false, 16 * 200, 120));
        stream.extend(encode_scan_packet(true, 0, 130));
        master.write_all(&stream).unwrap();
        sleep_ms(10);

        let scan = device.get_scan(TIMEOUT).unwrap();
        assert_eq!(scan.sample_count(), 2);
        assert_eq!(scan.angle(0), 0.5);
        assert_eq!(scan.distance(1), 120.);
    }

    #[test]
    fn test_get_scan_timeout() {
        let (mut master, mut device) = device_pair();
        master
            .write_all(&encode_scan_packet(true, 0, 100))
            .unwrap();

        let err = device.get_scan(Duration::from_millis(30)).err().unwrap();
        assert_eq!(err.kind(), crate::error::DriverErrorKind::Timeout);
    }

    #[test]
    fn test_get_scan_realigns_after_lost_bytes() {
        let (mut master, mut device) = device_pair();
        let mut stream = vec![0x5A, 0x13];
        stream.extend(encode_scan_packet(true, 0, 100));
        stream.extend(encode_scan_packet(false, 16 * 90, 150));
        stream.extend(encode_scan_packet(false, 16 * 180, 160));
        stream.extend(encode_scan_packet(true, 4, 170));
        master.write_all(&stream).unwrap();
        sleep_ms(10);

        let scan = device.get_scan(TIMEOUT).unwrap();
        assert_eq!(
            (0..scan.sample_count()).map(|i| scan.angle(i)).collect::<Vec<_>>(),
            vec![0., 90., 180.]
        );
        assert_eq!(scan.distance(2), 160.);
    }
}
