//! Entry model controller GATT protocol
//!
//! All supported controllers expose the same vendor service and push input
//! packets through a single notify characteristic. Identifiers are 16-bit
//! short forms on the Bluetooth base UUID.

use uuid::Uuid;

/// Bluetooth base UUID `0000xxxx-0000-1000-8000-00805f9b34fb`
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Controller service short id
pub const SERVICE_SHORT_ID: u16 = 0xff00;

/// Input notification characteristic short id
pub const INPUT_CHAR_SHORT_ID: u16 = 0xff01;

pub const SERVICE_UUID: Uuid = uuid_from_short_id(SERVICE_SHORT_ID);
pub const INPUT_CHAR_UUID: Uuid = uuid_from_short_id(INPUT_CHAR_SHORT_ID);

/// Expand a 16-bit short id onto the Bluetooth base UUID.
pub const fn uuid_from_short_id(short_id: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short_id as u128) << 96))
}

/// Format a 48-bit Bluetooth address as `aa:bb:cc:dd:ee:ff`.
pub fn format_bluetooth_address(address: u64) -> String {
    (0..6)
        .rev()
        .map(|octet| format!("{:02x}", (address >> (octet * 8)) & 0xff))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuids() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0000ff00-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            INPUT_CHAR_UUID.to_string(),
            "0000ff01-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_format_bluetooth_address() {
        assert_eq!(format_bluetooth_address(0xA4C1_3801_02FF), "a4:c1:38:01:02:ff");
        assert_eq!(format_bluetooth_address(0x1), "00:00:00:00:00:01");
        // Only the low 48 bits are an address
        assert_eq!(
            format_bluetooth_address(0xFFFF_0000_0000_0000),
            "00:00:00:00:00:00"
        );
    }
}
