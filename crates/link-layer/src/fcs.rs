//! AX.25 Frame Check Sequence
//!
//! CRC-16/X.25: reflected polynomial 0x8408, init 0xFFFF, final xor 0xFFFF.
//! Transmitted least-significant byte first, directly after the info field.

const CRC16_X25_POLY: u16 = 0x8408;

/// Compute the FCS over `data`.
pub fn crc16_x25(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC16_X25_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc ^ 0xFFFF
}

/// Append the FCS of `frame` to it.
pub fn append_fcs(frame: &mut Vec<u8>) {
    let fcs = crc16_x25(frame);
    frame.extend_from_slice(&fcs.to_le_bytes());
}
