pub(crate) fn to_u16(lo: u8, hi: u8) -> u16 {
    ((hi as u16) << 8) + (lo as u16)
}

/// Azimuth is transmitted as 12.4 fixed point degrees.
pub(crate) fn to_angle(lo: u8, hi: u8) -> f64 {
    (to_u16(lo, hi) as f64) / 16.
}

pub(crate) fn to_distance(lo: u8, hi: u8) -> f64 {
    to_u16(lo, hi) as f64
}

/// Parses two ASCII digits such as `b"07"`.
pub(crate) fn ascii_to_int(digits: [u8; 2]) -> Option<i32> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(((digits[0] - b'0') as i32) * 10 + (digits[1] - b'0') as i32)
}

pub(crate) fn int_to_ascii(value: i32) -> Option<[u8; 2]> {
    if !(0..100).contains(&value) {
        return None;
    }
    Some([b'0' + (value / 10) as u8, b'0' + (value % 10) as u8])
}

pub(crate) fn to_string(data: &[u8]) -> String {
    data.iter()
        .map(|e| format!("{:02X}", e))
        .collect::<Vec<_>>()
        .join(" ")
}
