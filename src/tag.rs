//! 平台 NFC 接口：适配器、标签及其技术类型。
//!
//! 各平台（Android/iOS 绑定、读卡器驱动、模拟器）实现这些 trait，控制器只依赖 trait。

use std::io;
use std::ops::{Deref, DerefMut};

use crate::model::{DispatchConfig, TagTech};

/// MIFARE Classic 出厂默认 Key A。
pub const MIFARE_KEY_DEFAULT: [u8; 6] = [0xFF; 6];

/// 设备上的 NFC 适配器。
pub trait NfcAdapter: Send {
    fn is_enabled(&self) -> bool;

    /// 当前界面可见时抢占标签发现事件。
    fn enable_foreground_dispatch(&mut self, config: &DispatchConfig) -> io::Result<()>;

    fn disable_foreground_dispatch(&mut self);
}

/// 可连接的标签技术（connect/close 成对出现）。
pub trait TagConnection {
    fn connect(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// NDEF 数据容器能力，读写原始 NDEF 消息字节。
pub trait NdefTech: TagConnection {
    /// 平台报告的 NDEF 类型，例如 `org.nfcforum.ndef.type2`。
    fn ndef_type(&self) -> String;
    fn max_size(&self) -> usize;
    fn is_writable(&self) -> bool;
    /// 标签未格式化或无消息时返回 `None`。
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>>;
    fn write_message(&mut self, message: &[u8]) -> io::Result<()>;
}

pub trait MifareClassicTech: TagConnection {
    /// 存储容量（字节）。
    fn size(&self) -> usize;
    fn sector_count(&self) -> usize;
    fn block_count(&self) -> usize;
    fn authenticate_sector_with_key_a(&mut self, sector: u8, key: &[u8; 6]) -> io::Result<bool>;
    fn read_block(&mut self, block: u8) -> io::Result<Vec<u8>>;
}

pub trait MifareUltralightTech: TagConnection {
    /// 从指定页开始读取 4 页（16 字节）。
    fn read_pages(&mut self, first_page: u8) -> io::Result<Vec<u8>>;
}

/// 一次物理贴卡对应的标签。
pub trait Tag {
    fn id(&self) -> Vec<u8>;
    fn tech_list(&self) -> Vec<TagTech>;
    fn ndef(&mut self) -> Option<&mut dyn NdefTech>;
    fn mifare_classic(&mut self) -> Option<&mut dyn MifareClassicTech>;
    fn mifare_ultralight(&mut self) -> Option<&mut dyn MifareUltralightTech>;
}

/// 标签会话：打开即 connect，离开作用域时 close（连接失败也会 close 一次）。
pub struct TagSession<'a, T: TagConnection + ?Sized> {
    tech: &'a mut T,
}

impl<'a, T: TagConnection + ?Sized> TagSession<'a, T> {
    pub fn open(tech: &'a mut T) -> io::Result<Self> {
        let mut session = Self { tech };
        session.tech.connect()?;
        Ok(session)
    }
}

impl<T: TagConnection + ?Sized> Deref for TagSession<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tech
    }
}

impl<T: TagConnection + ?Sized> DerefMut for TagSession<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.tech
    }
}

impl<T: TagConnection + ?Sized> Drop for TagSession<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.tech.close() {
            // 关闭失败不影响操作结果
            log::warn!("tag close failed: {}", err);
        }
    }
}

/// 字节数组转大写十六进制。
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
