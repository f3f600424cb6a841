use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 预订快照（二维码或标签中解析得到）。
///
/// 字段顺序即写入标签时的 JSON 键顺序。入住/离店日期只作为字符串携带，不做解析。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRecord {
    pub guest_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: String,
    pub check_out: String,
    pub hotel_id: String,
    pub room_number: String,
    pub lock_id: String,
}

impl fmt::Display for GuestRecord {
    /// 便于日志输出的格式化展示（不含邮箱）。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} hotel={} room={} lock={} stay={}..{}",
            self.guest_id,
            self.guest_name,
            self.hotel_id,
            self.room_number,
            self.lock_id,
            self.check_in,
            self.check_out
        )
    }
}

/// NFC 操作进度（任一时刻只有一个当前值）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NfcStatus {
    Idle,
    Ready,
    Writing,
    Reading,
    Validating(GuestRecord),
    Success(String),
    Error(String),
}

impl NfcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NfcStatus::Idle => "idle",
            NfcStatus::Ready => "ready",
            NfcStatus::Writing => "writing",
            NfcStatus::Reading => "reading",
            NfcStatus::Validating(_) => "validating",
            NfcStatus::Success(_) => "success",
            NfcStatus::Error(_) => "error",
        }
    }
}

impl fmt::Display for NfcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfcStatus::Validating(record) => write!(f, "validating({})", record.guest_id),
            NfcStatus::Success(message) | NfcStatus::Error(message) => {
                write!(f, "{}({})", self.as_str(), message)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// 标签支持的技术类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagTech {
    NfcA,
    NfcB,
    NfcF,
    NfcV,
    IsoDep,
    MifareClassic,
    MifareUltralight,
    Ndef,
    NdefFormatable,
}

impl TagTech {
    pub const ALL: [TagTech; 9] = [
        TagTech::NfcA,
        TagTech::NfcB,
        TagTech::NfcF,
        TagTech::NfcV,
        TagTech::IsoDep,
        TagTech::MifareClassic,
        TagTech::MifareUltralight,
        TagTech::Ndef,
        TagTech::NdefFormatable,
    ];

    /// 短名称（诊断报告中使用）。
    pub fn as_str(&self) -> &'static str {
        match self {
            TagTech::NfcA => "NfcA",
            TagTech::NfcB => "NfcB",
            TagTech::NfcF => "NfcF",
            TagTech::NfcV => "NfcV",
            TagTech::IsoDep => "IsoDep",
            TagTech::MifareClassic => "MifareClassic",
            TagTech::MifareUltralight => "MifareUltralight",
            TagTech::Ndef => "Ndef",
            TagTech::NdefFormatable => "NdefFormatable",
        }
    }
}

/// 前台分发监听的发现事件类型。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryAction {
    /// NDEF 标签，附带 MIME 过滤。
    NdefDiscovered { mime_filter: String },
    TechDiscovered,
    TagDiscovered,
}

/// 前台分发注册参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub actions: Vec<DiscoveryAction>,
    pub tech_list: Vec<TagTech>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            actions: vec![
                DiscoveryAction::NdefDiscovered {
                    mime_filter: "*/*".to_string(),
                },
                DiscoveryAction::TechDiscovered,
                DiscoveryAction::TagDiscovered,
            ],
            tech_list: TagTech::ALL.to_vec(),
        }
    }
}

/// 默认的诊断文件目录（可由 .env 的 NFC_DUMP_DIR 覆盖）。
pub const DEFAULT_DUMP_DIR: &str = "downloads";

/// 入住终端运行参数（可配置项）。
#[derive(Clone, Debug)]
pub struct CheckinSettings {
    pub dump_dir: PathBuf,
    pub dispatch: DispatchConfig,
}

impl CheckinSettings {
    /// 使用指定诊断目录构建默认参数。
    pub fn with_dump_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dump_dir: dir.into(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Default for CheckinSettings {
    fn default() -> Self {
        Self::with_dump_dir(option_env!("NFC_DUMP_DIR").unwrap_or(DEFAULT_DUMP_DIR))
    }
}
