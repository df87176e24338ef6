pub(crate) const CMD_TERMINATOR: u8 = b'\n';
pub(crate) const CMD_START_SCANNING: [u8; 2] = *b"DS";
pub(crate) const CMD_STOP_SCANNING: [u8; 2] = *b"DX";
pub(crate) const CMD_SET_MOTOR_SPEED: [u8; 2] = *b"MS";
pub(crate) const CMD_MOTOR_INFO: [u8; 2] = *b"MZ";
pub(crate) const CMD_SAMPLE_RATE_INFO: [u8; 2] = *b"LI";
pub(crate) const CMD_RESET: [u8; 2] = *b"RR";
// XY s1 s2 sum \n
pub(crate) const RESPONSE_HEADER_SIZE: usize = 6;
// XY ab \n s1 s2 sum \n
pub(crate) const RESPONSE_PARAM_SIZE: usize = 9;
// XY ab \n
pub(crate) const RESPONSE_INFO_SIZE: usize = 5;
pub(crate) const SCAN_PACKET_SIZE: usize = 7;
pub(crate) const STATUS_OK: [u8; 2] = *b"00";
pub(crate) const SYNC_BIT: u8 = 0x01;
// The device keeps streaming for a short while after DX
pub(crate) const STOP_SETTLE_MS: u64 = 35;
pub(crate) const POLL_INTERVAL_MS: u64 = 1;
