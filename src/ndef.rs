//! NDEF 消息编解码（标签上的记录容器）。
//!
//! 记录头：MB | ME | CF | SR | IL | TNF(3 bit)，随后为类型长度、载荷长度
//! （SR 时 1 字节，否则 4 字节大端）、可选 ID 长度、类型、ID、载荷。

use thiserror::Error;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// 记录类型格式（Type Name Format）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tnf {
    Empty,
    WellKnown,
    MimeMedia,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
    Reserved,
}

impl Tnf {
    pub fn from_u8(value: u8) -> Self {
        match value & TNF_MASK {
            0 => Tnf::Empty,
            1 => Tnf::WellKnown,
            2 => Tnf::MimeMedia,
            3 => Tnf::AbsoluteUri,
            4 => Tnf::External,
            5 => Tnf::Unknown,
            6 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Tnf::Empty => 0,
            Tnf::WellKnown => 1,
            Tnf::MimeMedia => 2,
            Tnf::AbsoluteUri => 3,
            Tnf::External => 4,
            Tnf::Unknown => 5,
            Tnf::Unchanged => 6,
            Tnf::Reserved => 7,
        }
    }
}

/// 解码错误类型。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NdefError {
    #[error("NDEF message is too short")]
    TooShort,
    #[error("first NDEF record lacks the message-begin flag")]
    MissingBegin,
    #[error("message-begin flag set on a later NDEF record")]
    UnexpectedBegin,
    #[error("NDEF message has no message-end record")]
    MissingEnd,
    #[error("chunked NDEF records are not supported")]
    Chunked,
    #[error("NDEF record length exceeds the message")]
    Truncated,
    #[error("unexpected bytes after the NDEF message end")]
    TrailingBytes,
}

/// 单条 NDEF 记录。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    /// 构造 MIME 记录（类型统一小写）。
    pub fn mime(mime_type: &str, payload: Vec<u8>) -> Self {
        Self {
            tnf: Tnf::MimeMedia,
            record_type: mime_type.trim().to_ascii_lowercase().into_bytes(),
            id: Vec::new(),
            payload,
        }
    }

    pub fn is_mime(&self, mime_type: &str) -> bool {
        self.tnf == Tnf::MimeMedia && self.record_type.eq_ignore_ascii_case(mime_type.as_bytes())
    }

    fn is_short(&self) -> bool {
        self.payload.len() <= u8::MAX as usize
    }

    fn encoded_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_len_field = usize::from(!self.id.is_empty());
        1 + 1
            + payload_len_field
            + id_len_field
            + self.record_type.len()
            + self.id.len()
            + self.payload.len()
    }

    fn encode_into(&self, out: &mut Vec<u8>, first: bool, last: bool) {
        let mut header = self.tnf.as_u8();
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }
        out.push(header);
        let type_len = self.record_type.len().min(u8::MAX as usize);
        out.push(type_len as u8);
        if self.is_short() {
            out.push(self.payload.len() as u8);
        } else {
            let len = self.payload.len().min(u32::MAX as usize) as u32;
            out.extend_from_slice(&len.to_be_bytes());
        }
        if !self.id.is_empty() {
            let id_len = self.id.len().min(u8::MAX as usize);
            out.push(id_len as u8);
        }
        out.extend_from_slice(&self.record_type[..type_len]);
        if !self.id.is_empty() {
            out.extend_from_slice(&self.id[..self.id.len().min(u8::MAX as usize)]);
        }
        out.extend_from_slice(&self.payload);
    }
}

/// NDEF 消息（至少一条记录）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    /// 编码后的字节长度，用于容量检查。
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(NdefRecord::encoded_len).sum()
    }

    /// 编码为字节流（首条 MB，末条 ME）。
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let last = self.records.len().saturating_sub(1);
        for (idx, record) in self.records.iter().enumerate() {
            record.encode_into(&mut out, idx == 0, idx == last);
        }
        out
    }

    /// 所有记录均为空类型时视为空标签。
    pub fn is_empty_message(&self) -> bool {
        self.records.iter().all(|r| r.tnf == Tnf::Empty)
    }

    /// 取第一条指定 MIME 类型记录的载荷。
    pub fn find_mime_payload(&self, mime_type: &str) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|r| r.is_mime(mime_type))
            .map(|r| r.payload.as_slice())
    }
}

/// 解码字节流为 NDEF 消息，校验 MB/ME 与长度。
pub fn decode_message(data: &[u8]) -> Result<NdefMessage, NdefError> {
    if data.len() < 3 {
        return Err(NdefError::TooShort);
    }
    let mut cursor = 0;
    let mut records = Vec::new();
    loop {
        let header = read_u8(data, &mut cursor)?;
        match (records.is_empty(), header & FLAG_MB != 0) {
            (true, false) => return Err(NdefError::MissingBegin),
            (false, true) => return Err(NdefError::UnexpectedBegin),
            _ => {}
        }
        if header & FLAG_CF != 0 {
            return Err(NdefError::Chunked);
        }
        let type_len = read_u8(data, &mut cursor)? as usize;
        let payload_len = if header & FLAG_SR != 0 {
            read_u8(data, &mut cursor)? as usize
        } else {
            read_u32_be(data, &mut cursor)? as usize
        };
        let id_len = if header & FLAG_IL != 0 {
            read_u8(data, &mut cursor)? as usize
        } else {
            0
        };
        let record_type = read_slice(data, &mut cursor, type_len)?.to_vec();
        let id = read_slice(data, &mut cursor, id_len)?.to_vec();
        let payload = read_slice(data, &mut cursor, payload_len)?.to_vec();
        records.push(NdefRecord {
            tnf: Tnf::from_u8(header),
            record_type,
            id,
            payload,
        });

        if header & FLAG_ME != 0 {
            break;
        }
        if cursor >= data.len() {
            return Err(NdefError::MissingEnd);
        }
    }
    if cursor != data.len() {
        return Err(NdefError::TrailingBytes);
    }
    Ok(NdefMessage { records })
}

fn read_u8(data: &[u8], cursor: &mut usize) -> Result<u8, NdefError> {
    let value = *data.get(*cursor).ok_or(NdefError::Truncated)?;
    *cursor += 1;
    Ok(value)
}

/// 读取 u32（大端）。
fn read_u32_be(data: &[u8], cursor: &mut usize) -> Result<u32, NdefError> {
    let bytes = read_slice(data, cursor, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_slice<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], NdefError> {
    let end = cursor.checked_add(len).ok_or(NdefError::Truncated)?;
    let slice = data.get(*cursor..end).ok_or(NdefError::Truncated)?;
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_mime_record_layout() {
        let message = NdefMessage::new(vec![NdefRecord::mime("Application/JSON", b"{}".to_vec())]);
        let bytes = message.encode();
        let mut expected = vec![0xD2, 16, 2];
        expected.extend_from_slice(b"application/json{}");
        assert_eq!(bytes, expected);
        assert_eq!(message.encoded_len(), bytes.len());
        assert_eq!(decode_message(&bytes).unwrap(), message);
    }

    #[test]
    fn long_payload_uses_four_byte_length() {
        let payload = vec![b'x'; 300];
        let message = NdefMessage::new(vec![NdefRecord::mime("application/json", payload)]);
        let bytes = message.encode();
        assert_eq!(bytes[0] & FLAG_SR, 0);
        assert_eq!(&bytes[2..6], &300u32.to_be_bytes());
        assert_eq!(bytes.len(), 1 + 1 + 4 + 16 + 300);
        assert_eq!(decode_message(&bytes).unwrap(), message);
    }

    #[test]
    fn multi_record_flags_and_lookup() {
        let message = NdefMessage::new(vec![
            NdefRecord {
                tnf: Tnf::WellKnown,
                record_type: b"T".to_vec(),
                id: b"a".to_vec(),
                payload: b"\x02enhi".to_vec(),
            },
            NdefRecord::mime("application/json", b"{\"k\":1}".to_vec()),
        ]);
        let bytes = message.encode();
        assert_eq!(bytes[0] & (FLAG_MB | FLAG_ME | FLAG_IL), FLAG_MB | FLAG_IL);
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.find_mime_payload("APPLICATION/json"), Some(&b"{\"k\":1}"[..]));
        assert_eq!(decoded.find_mime_payload("text/plain"), None);
    }

    #[test]
    fn empty_record_message_is_empty() {
        let decoded = decode_message(&[0xD0, 0x00, 0x00]).unwrap();
        assert!(decoded.is_empty_message());
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(decode_message(&[0xD2]), Err(NdefError::TooShort));
        assert_eq!(decode_message(&[0x52, 0x01, 0x00, b'a']), Err(NdefError::MissingBegin));
        assert_eq!(decode_message(&[0xF2, 0x01, 0x00, b'a']), Err(NdefError::Chunked));
        assert_eq!(decode_message(&[0xD2, 0x01, 0x05, b'a', b'b']), Err(NdefError::Truncated));
        assert_eq!(decode_message(&[0x92, 0x01, 0x00, b'a']), Err(NdefError::MissingEnd));
        // 两条消息首尾相接：第二条记录再次带 MB
        assert_eq!(
            decode_message(&[0x92, 0x01, 0x00, b'a', 0xD2, 0x01, 0x00, b'b']),
            Err(NdefError::UnexpectedBegin)
        );
        assert_eq!(
            decode_message(&[0xD2, 0x01, 0x00, b'a', 0x00]),
            Err(NdefError::TrailingBytes)
        );
    }
}
