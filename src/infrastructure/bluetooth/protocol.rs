//! SenStick Advertising Protocol
//!
//! Identifiers the coordinator needs to find SenStick peripherals. Sensor
//! services and their data formats live with the per-sensor code.

use anyhow::Result;
use uuid::Uuid;

/// Vendor base UUID; the 16-bit service id replaces `XXXX`
pub const BASE_UUID: &str = "f000XXXX-0451-4000-b000-000000000000";

/// Service UUID carried in SenStick advertisements (base UUID with 0x2000)
pub const ADVERTISING_SERVICE_UUID: &str = "f0002000-0451-4000-b000-000000000000";

/// 16-bit id of the advertising service within the vendor base
pub const ADVERTISING_SERVICE_ID: u16 = 0x2000;

/// Expand a 16-bit id into the full vendor UUID
pub fn vendor_uuid(short_id: u16) -> Uuid {
    // f000XXXX-0451-4000-b000-000000000000
    let high = 0xf000_0000_0451_4000_u64 | (u64::from(short_id) << 32);
    let low = 0xb000_0000_0000_0000_u64;
    Uuid::from_u64_pair(high, low)
}

pub fn advertising_service_uuid() -> Uuid {
    vendor_uuid(ADVERTISING_SERVICE_ID)
}

/// Parse a UUID string (hyphens optional, case-insensitive)
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    Uuid::parse_str(uuid_str.trim())
        .map_err(|e| anyhow::anyhow!("Invalid UUID format '{}': {}", uuid_str, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let uuid = parse_uuid(ADVERTISING_SERVICE_UUID).unwrap();
        assert_eq!(uuid.as_fields().0, 0xf0002000);

        let compact = parse_uuid("F000200004514000B000000000000000").unwrap();
        assert_eq!(uuid, compact);

        assert!(parse_uuid("f0002000-0451").is_err());
    }

    #[test]
    fn test_vendor_uuid_matches_constant() {
        assert_eq!(
            advertising_service_uuid(),
            parse_uuid(ADVERTISING_SERVICE_UUID).unwrap()
        );
        assert_eq!(
            vendor_uuid(0x2100).to_string(),
            BASE_UUID.replace("XXXX", "2100")
        );
    }
}
