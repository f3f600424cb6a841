use serde::Deserialize;
use thiserror::Error;

use crate::model::GuestRecord;

/// 标签载荷的 MIME 类型。
pub const GUEST_MIME: &str = "application/json";

/// 预订数据解码/编码错误。
#[derive(Debug, Error)]
pub enum GuestDataError {
    #[error("malformed guest data: {0}")]
    Json(#[from] serde_json::Error),
}

/// 二维码里的预订数据：日期字段名与标签载荷不同。
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScannedGuest {
    guest_id: String,
    guest_name: String,
    guest_email: String,
    check_in_date: String,
    check_out_date: String,
    hotel_id: String,
    room_number: String,
    lock_id: String,
}

impl From<ScannedGuest> for GuestRecord {
    fn from(value: ScannedGuest) -> Self {
        Self {
            guest_id: value.guest_id,
            guest_name: value.guest_name,
            guest_email: value.guest_email,
            check_in: value.check_in_date,
            check_out: value.check_out_date,
            hotel_id: value.hotel_id,
            room_number: value.room_number,
            lock_id: value.lock_id,
        }
    }
}

/// 解析扫码得到的文本（`checkInDate`/`checkOutDate`）。
pub fn parse_scanned(text: &str) -> Result<GuestRecord, GuestDataError> {
    let scanned: ScannedGuest = serde_json::from_str(text)?;
    Ok(scanned.into())
}

/// 解析标签载荷（`checkIn`/`checkOut`）。
pub fn parse_tag_payload(text: &str) -> Result<GuestRecord, GuestDataError> {
    Ok(serde_json::from_str(text)?)
}

/// 序列化为标签载荷，与 [`parse_tag_payload`] 互逆。
pub fn serialize(record: &GuestRecord) -> Result<String, GuestDataError> {
    Ok(serde_json::to_string(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> GuestRecord {
        GuestRecord {
            guest_id: "G1".to_string(),
            guest_name: "Ana".to_string(),
            guest_email: "a@x.com".to_string(),
            check_in: "2024-01-01".to_string(),
            check_out: "2024-01-03".to_string(),
            hotel_id: "H1".to_string(),
            room_number: "101".to_string(),
            lock_id: "L1".to_string(),
        }
    }

    #[test]
    fn tag_payload_round_trip() {
        let record = sample();
        let text = serialize(&record).unwrap();
        assert_eq!(parse_tag_payload(&text).unwrap(), record);
    }

    #[test]
    fn serializes_keys_in_payload_order() {
        let text = serialize(&sample()).unwrap();
        assert_eq!(
            text,
            r#"{"guestId":"G1","guestName":"Ana","guestEmail":"a@x.com","checkIn":"2024-01-01","checkOut":"2024-01-03","hotelId":"H1","roomNumber":"101","lockId":"L1"}"#
        );
    }

    #[test]
    fn scanned_code_uses_date_suffixed_keys() {
        let text = r#"{"guestId":"G1","guestName":"Ana","guestEmail":"a@x.com",
            "checkInDate":"2024-01-01","checkOutDate":"2024-01-03",
            "hotelId":"H1","roomNumber":"101","lockId":"L1","extra":42}"#;
        assert_eq!(parse_scanned(text).unwrap(), sample());
    }

    #[test]
    fn scanned_parser_rejects_tag_payload_keys() {
        let text = serialize(&sample()).unwrap();
        assert!(parse_scanned(&text).is_err());
    }

    #[test]
    fn rejects_each_missing_key() {
        let full: serde_json::Value = serde_json::from_str(&serialize(&sample()).unwrap()).unwrap();
        let keys: Vec<String> = full.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 8);
        for key in keys {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(&key);
            assert!(
                parse_tag_payload(&partial.to_string()).is_err(),
                "accepted record without {key}"
            );
        }
    }

    #[test]
    fn rejects_non_json_and_wrong_types() {
        assert!(parse_tag_payload("not json").is_err());
        assert!(parse_tag_payload("[]").is_err());
        assert!(parse_tag_payload("").is_err());
        let numeric_room = serialize(&sample())
            .unwrap()
            .replace(r#""roomNumber":"101""#, r#""roomNumber":101"#);
        assert!(parse_tag_payload(&numeric_room).is_err());
    }
}
