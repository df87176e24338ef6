use crate::constants::{
    CMD_TERMINATOR, RESPONSE_HEADER_SIZE, RESPONSE_INFO_SIZE, RESPONSE_PARAM_SIZE,
    SCAN_PACKET_SIZE, STATUS_OK, SYNC_BIT,
};
use crate::error::DriverError;
use crate::numeric::{to_angle, to_distance, to_string, to_u16};

/// One decoded 7-byte measurement packet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScanPacket {
    pub(crate) sync_error: u8,
    pub(crate) angle_raw: u16,
    pub(crate) distance_raw: u16,
    pub(crate) signal_strength: u8,
}

impl ScanPacket {
    pub(crate) fn is_sync(&self) -> bool {
        self.sync_error & SYNC_BIT == SYNC_BIT
    }

    pub(crate) fn has_error(&self) -> bool {
        self.sync_error & !SYNC_BIT != 0
    }

    pub(crate) fn angle(&self) -> f64 {
        to_angle(self.angle_raw as u8, (self.angle_raw >> 8) as u8)
    }

    pub(crate) fn distance(&self) -> f64 {
        to_distance(self.distance_raw as u8, (self.distance_raw >> 8) as u8)
    }
}

pub(crate) fn status_checksum(s1: u8, s2: u8) -> u8 {
    (s1.wrapping_add(s2) & 0x3F) + 0x30
}

fn scan_checksum(packet: &[u8]) -> u8 {
    let sum: u32 = packet[..SCAN_PACKET_SIZE - 1].iter().map(|&b| b as u32).sum();
    (sum % 255) as u8
}

fn status_message(command: [u8; 2], status: [u8; 2]) -> String {
    let reason = match (&command, &status) {
        (b"DS", b"12") => "motor speed has not stabilized",
        (b"DS", b"13") => "motor is stationary",
        (b"MS", b"11") => "invalid motor speed parameter",
        (b"MS", b"12") => "motor speed has not stabilized",
        _ => "command rejected",
    };
    format!(
        "{}: {} (status {})",
        String::from_utf8_lossy(&command),
        reason,
        String::from_utf8_lossy(&status)
    )
}

fn check_echo(response: &[u8], command: [u8; 2]) -> Result<(), DriverError> {
    if response[0..2] != command {
        return Err(DriverError::transport(format!(
            "expected response to {}, observed = {}",
            String::from_utf8_lossy(&command),
            to_string(&response[0..2])
        )));
    }
    Ok(())
}

fn check_status(status: [u8; 2], sum: u8, command: [u8; 2]) -> Result<(), DriverError> {
    let calculated = status_checksum(status[0], status[1]);
    if sum != calculated {
        return Err(DriverError::transport(format!(
            "status checksum mismatched. Calculated = {:02X}, expected = {:02X}",
            calculated, sum
        )));
    }
    if status != STATUS_OK {
        return Err(DriverError::rejected(status_message(command, status)));
    }
    Ok(())
}

/// Validates `XY s1 s2 sum \n`.
pub(crate) fn validate_response_header(header: &[u8], command: [u8; 2]) -> Result<(), DriverError> {
    if header.len() != RESPONSE_HEADER_SIZE {
        return Err(DriverError::transport(format!(
            "response header must be {} bytes, actually {} bytes",
            RESPONSE_HEADER_SIZE,
            header.len()
        )));
    }
    check_echo(header, command)?;
    check_status([header[2], header[3]], header[4], command)
}

/// Validates `XY ab \n s1 s2 sum \n`.
pub(crate) fn validate_param_response(
    response: &[u8],
    command: [u8; 2],
    param: [u8; 2],
) -> Result<(), DriverError> {
    if response.len() != RESPONSE_PARAM_SIZE {
        return Err(DriverError::transport(format!(
            "parameter response must be {} bytes, actually {} bytes",
            RESPONSE_PARAM_SIZE,
            response.len()
        )));
    }
    check_echo(response, command)?;
    if response[2..4] != param || response[4] != CMD_TERMINATOR {
        return Err(DriverError::transport(format!(
            "parameter echo mismatched: {}",
            to_string(&response[2..5])
        )));
    }
    check_status([response[5], response[6]], response[7], command)
}

/// Extracts the two payload bytes of `XY ab \n`.
pub(crate) fn parse_info_response(response: &[u8], command: [u8; 2]) -> Result<[u8; 2], DriverError> {
    if response.len() != RESPONSE_INFO_SIZE || response[4] != CMD_TERMINATOR {
        return Err(DriverError::transport(format!(
            "malformed info response: {}",
            to_string(response)
        )));
    }
    check_echo(response, command)?;
    Ok([response[2], response[3]])
}

pub(crate) fn parse_scan_packet(packet: &[u8]) -> Result<ScanPacket, DriverError> {
    if packet.len() != SCAN_PACKET_SIZE {
        return Err(DriverError::transport(format!(
            "scan packet must be {} bytes, actually {} bytes",
            SCAN_PACKET_SIZE,
            packet.len()
        )));
    }
    let calculated = scan_checksum(packet);
    if packet[6] != calculated {
        return Err(DriverError::transport(format!(
            "scan packet checksum mismatched. Calculated = {:02X}, expected = {:02X}",
            calculated, packet[6]
        )));
    }
    Ok(ScanPacket {
        sync_error: packet[0],
        angle_raw: to_u16(packet[1], packet[2]),
        distance_raw: to_u16(packet[3], packet[4]),
        signal_strength: packet[5],
    })
}

#[cfg(test)]
pub(crate) fn encode_scan_packet(sync: bool, angle_raw: u16, distance_raw: u16) -> [u8; 7] {
    let mut packet = [
        sync as u8,
        angle_raw as u8,
        (angle_raw >> 8) as u8,
        distance_raw as u8,
        (distance_raw >> 8) as u8,
        0xC8,
        0,
    ];
    packet[6] = scan_checksum(&packet);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverErrorKind;

    #[test]
    fn test_status_checksum() {
        // "00" -> 0x30 + 0x30 = 0x60, & 0x3F = 0x20, + 0x30 = 0x50 ('P')
        assert_eq!(status_checksum(b'0', b'0'), b'P');
        assert_eq!(status_checksum(b'1', b'2'), 0x53);
    }

    #[test]
    fn test_validate_response_header() {
        assert!(validate_response_header(b"DS00P\n", *b"DS").is_ok());

        let err = validate_response_header(b"DS00P\n\n", *b"DS").unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Transport);

        let err = validate_response_header(b"DX00P\n", *b"DS").unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Transport);

        let err = validate_response_header(b"DS00Q\n", *b"DS").unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Transport);

        let err = validate_response_header(b"DS12S\n", *b"DS").unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Rejected);
        assert_eq!(
            err.message(),
            "DS: motor speed has not stabilized (status 12)"
        );
    }

    #[test]
    fn test_validate_param_response() {
        assert!(validate_param_response(b"MS05\n00P\n", *b"MS", *b"05").is_ok());
        assert!(validate_param_response(b"MS06\n00P\n", *b"MS", *b"05").is_err());

        let err = validate_param_response(b"MS11\n11R\n", *b"MS", *b"11").unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Rejected);
    }

    #[test]
    fn test_parse_info_response() {
        assert_eq!(parse_info_response(b"MZ05\n", *b"MZ").unwrap(), *b"05");
        assert!(parse_info_response(b"LI05\n", *b"MZ").is_err());
        assert!(parse_info_response(b"MZ05\r", *b"MZ").is_err());
    }

    #[test]
    fn test_parse_scan_packet() {
        let bytes = encode_scan_packet(true, 0x0010, 0x03E8);
        let packet = parse_scan_packet(&bytes).unwrap();
        assert!(packet.is_sync());
        assert!(!packet.has_error());
        assert_eq!(packet.angle(), 1.);
        assert_eq!(packet.distance(), 1000.);
        assert_eq!(packet.signal_strength, 0xC8);

        let mut corrupted = bytes;
        corrupted[3] ^= 0xFF;
        assert!(parse_scan_packet(&corrupted).is_err());

        let packet = parse_scan_packet(&encode_scan_packet(false, 0x167F, 12)).unwrap();
        assert!(!packet.is_sync());
        assert_eq!(packet.angle(), 359.9375);
    }
}
