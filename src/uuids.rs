//! Protocol constants for lighthouse V2 base stations.
//!
//! Base stations advertise a local name starting with `LHB-` and expose a
//! vendor power service with a single writable power characteristic.

use uuid::Uuid;

/// Advertised name prefix that identifies a lighthouse base station.
pub const LIGHTHOUSE_NAME_PREFIX: &str = "LHB-";

/// Vendor power service UUID (`00001523-1212-efde-1523-785feabcd124`).
pub const POWER_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1523_1212_efde_1523_785feabcd124);

/// Power characteristic UUID (`00001525-1212-efde-1523-785feabcd124`).
///
/// Read: first byte is the current power state. Write: see [`POWER_ON`] and
/// [`POWER_OFF`].
pub const POWER_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_1525_1212_efde_1523_785feabcd124);

/// Byte written to the power characteristic to switch the base station off.
pub const POWER_OFF: u8 = 0x00;

/// Byte written to the power characteristic to switch the base station on.
pub const POWER_ON: u8 = 0x01;

/// Check whether an advertised name identifies a lighthouse base station.
pub fn is_lighthouse_name(name: &str) -> bool {
    name.contains(LIGHTHOUSE_NAME_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let service = POWER_SERVICE_UUID.to_string();
        assert_eq!(service, "00001523-1212-efde-1523-785feabcd124");

        let characteristic = POWER_CHARACTERISTIC_UUID.to_string();
        assert_eq!(characteristic, "00001525-1212-efde-1523-785feabcd124");
    }

    #[test]
    fn test_is_lighthouse_name() {
        assert!(is_lighthouse_name("LHB-AABBCC"));
        assert!(is_lighthouse_name("prefix LHB-XY"));
        assert!(!is_lighthouse_name("HTC Vive"));
        assert!(!is_lighthouse_name("lhb-aabbcc"));
    }
}
