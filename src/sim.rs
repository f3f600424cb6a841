//! 内存模拟的 NFC 适配器与标签（控制台宿主与测试使用）。
//!
//! `MemoryTag` 克隆后共享同一块存储，可模拟同一张卡被多次贴近。

use std::io;
use std::sync::{Arc, Mutex};

use crate::model::{DispatchConfig, TagTech};
use crate::status::lock;
use crate::tag::{
    MifareClassicTech, MifareUltralightTech, NdefTech, NfcAdapter, Tag, TagConnection,
    MIFARE_KEY_DEFAULT,
};

const NDEF_TYPE_2: &str = "org.nfcforum.ndef.type2";
const CLASSIC_SECTORS: usize = 16;
const CLASSIC_BLOCKS_PER_SECTOR: usize = 4;
const CLASSIC_BLOCK_LEN: usize = 16;
const ULTRALIGHT_PAGES: usize = 16;
const ULTRALIGHT_PAGE_LEN: usize = 4;

#[derive(Debug, Default)]
struct AdapterState {
    enabled: bool,
    dispatch: Option<DispatchConfig>,
    fail_dispatch: bool,
}

/// 模拟适配器；克隆体共享状态，便于在控制器之外查看分发注册情况。
#[derive(Clone, Debug, Default)]
pub struct MemoryAdapter {
    state: Arc<Mutex<AdapterState>>,
}

impl MemoryAdapter {
    pub fn new(enabled: bool) -> Self {
        let adapter = Self::default();
        lock(&adapter.state).enabled = enabled;
        adapter
    }

    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.state).enabled = enabled;
    }

    /// 下一次注册前台分发时失败。
    pub fn fail_dispatch(self) -> Self {
        lock(&self.state).fail_dispatch = true;
        self
    }

    pub fn dispatch(&self) -> Option<DispatchConfig> {
        lock(&self.state).dispatch.clone()
    }
}

impl NfcAdapter for MemoryAdapter {
    fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    fn enable_foreground_dispatch(&mut self, config: &DispatchConfig) -> io::Result<()> {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.fail_dispatch) {
            return Err(io::Error::other("activity not resumed"));
        }
        state.dispatch = Some(config.clone());
        Ok(())
    }

    fn disable_foreground_dispatch(&mut self) {
        lock(&self.state).dispatch = None;
    }
}

/// 模拟标签种类（控制台 `tap` 命令使用）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// 可写的空 NDEF 标签，1024 字节。
    Blank,
    /// 只读 NDEF 标签。
    ReadOnly,
    /// 容量只有 32 字节的 NDEF 标签。
    Small,
    Classic,
    Ultralight,
    /// 不支持 NDEF 的标签。
    Plain,
}

impl TagKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blank" | "ndef" => Some(TagKind::Blank),
            "readonly" | "read-only" => Some(TagKind::ReadOnly),
            "small" => Some(TagKind::Small),
            "classic" => Some(TagKind::Classic),
            "ultralight" => Some(TagKind::Ultralight),
            "plain" => Some(TagKind::Plain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Blank => "blank",
            TagKind::ReadOnly => "readonly",
            TagKind::Small => "small",
            TagKind::Classic => "classic",
            TagKind::Ultralight => "ultralight",
            TagKind::Plain => "plain",
        }
    }
}

/// 连接/读写次数统计。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagCounters {
    pub connects: u32,
    pub closes: u32,
    pub reads: u32,
    pub writes: u32,
}

#[derive(Clone, Copy, Debug, Default)]
struct TagFaults {
    connect: bool,
    read: bool,
    write: bool,
}

struct NdefStore {
    ndef_type: String,
    capacity: usize,
    writable: bool,
    message: Option<Vec<u8>>,
}

struct ClassicStore {
    blocks: Vec<[u8; CLASSIC_BLOCK_LEN]>,
    sector0_key: [u8; 6],
    authenticated: Option<u8>,
}

struct TagStore {
    id: Vec<u8>,
    techs: Vec<TagTech>,
    ndef: Option<NdefStore>,
    classic: Option<ClassicStore>,
    pages: Option<Vec<[u8; ULTRALIGHT_PAGE_LEN]>>,
    connected: bool,
    counters: TagCounters,
    faults: TagFaults,
    on_connect: Option<Arc<dyn Fn() + Send + Sync>>,
}

type SharedStore = Arc<Mutex<TagStore>>;

/// 内存标签。
#[derive(Clone)]
pub struct MemoryTag {
    store: SharedStore,
    ndef: Option<MemoryNdef>,
    classic: Option<MemoryClassic>,
    ultralight: Option<MemoryUltralight>,
}

impl MemoryTag {
    fn build(id: &[u8], techs: Vec<TagTech>) -> TagStore {
        TagStore {
            id: id.to_vec(),
            techs,
            ndef: None,
            classic: None,
            pages: None,
            connected: false,
            counters: TagCounters::default(),
            faults: TagFaults::default(),
            on_connect: None,
        }
    }

    fn from_store(store: TagStore) -> Self {
        let has_ndef = store.ndef.is_some();
        let has_classic = store.classic.is_some();
        let has_pages = store.pages.is_some();
        let store = Arc::new(Mutex::new(store));
        Self {
            ndef: has_ndef.then(|| MemoryNdef(store.clone())),
            classic: has_classic.then(|| MemoryClassic(store.clone())),
            ultralight: has_pages.then(|| MemoryUltralight(store.clone())),
            store,
        }
    }

    /// 可写的空 NDEF 标签。
    pub fn ndef(id: &[u8], capacity: usize) -> Self {
        let mut store = Self::build(id, vec![TagTech::NfcA, TagTech::Ndef]);
        store.ndef = Some(NdefStore {
            ndef_type: NDEF_TYPE_2.to_string(),
            capacity,
            writable: true,
            message: None,
        });
        Self::from_store(store)
    }

    /// MIFARE Classic 1K，扇区 0 使用默认密钥。
    pub fn mifare_classic(id: &[u8]) -> Self {
        let mut store = Self::build(
            id,
            vec![TagTech::NfcA, TagTech::MifareClassic, TagTech::NdefFormatable],
        );
        let mut blocks = vec![[0u8; CLASSIC_BLOCK_LEN]; CLASSIC_SECTORS * CLASSIC_BLOCKS_PER_SECTOR];
        // 厂商块：UID + BCC
        let uid_len = id.len().min(4);
        blocks[0][..uid_len].copy_from_slice(&id[..uid_len]);
        blocks[0][4] = id.iter().take(4).fold(0, |acc, b| acc ^ b);
        store.classic = Some(ClassicStore {
            blocks,
            sector0_key: MIFARE_KEY_DEFAULT,
            authenticated: None,
        });
        Self::from_store(store)
    }

    /// MIFARE Ultralight，16 页，前几页为 UID。
    pub fn mifare_ultralight(id: &[u8]) -> Self {
        let mut store = Self::build(id, vec![TagTech::NfcA, TagTech::MifareUltralight]);
        let mut pages = vec![[0u8; ULTRALIGHT_PAGE_LEN]; ULTRALIGHT_PAGES];
        for (idx, byte) in id.iter().take(8).enumerate() {
            pages[idx / ULTRALIGHT_PAGE_LEN][idx % ULTRALIGHT_PAGE_LEN] = *byte;
        }
        store.pages = Some(pages);
        Self::from_store(store)
    }

    /// 只有 NfcA、不支持任何数据容器的标签。
    pub fn plain(id: &[u8]) -> Self {
        Self::from_store(Self::build(id, vec![TagTech::NfcA]))
    }

    pub fn from_kind(kind: TagKind, id: &[u8]) -> Self {
        match kind {
            TagKind::Blank => Self::ndef(id, 1024),
            TagKind::ReadOnly => Self::ndef(id, 1024).read_only(),
            TagKind::Small => Self::ndef(id, 32),
            TagKind::Classic => Self::mifare_classic(id),
            TagKind::Ultralight => Self::mifare_ultralight(id),
            TagKind::Plain => Self::plain(id),
        }
    }

    pub fn read_only(self) -> Self {
        if let Some(ndef) = lock(&self.store).ndef.as_mut() {
            ndef.writable = false;
        }
        self
    }

    /// 预置原始 NDEF 消息字节。
    pub fn with_message(self, message: Vec<u8>) -> Self {
        if let Some(ndef) = lock(&self.store).ndef.as_mut() {
            ndef.message = Some(message);
        }
        self
    }

    pub fn with_sector0_key(self, key: [u8; 6]) -> Self {
        if let Some(classic) = lock(&self.store).classic.as_mut() {
            classic.sector0_key = key;
        }
        self
    }

    pub fn fail_connect(self) -> Self {
        lock(&self.store).faults.connect = true;
        self
    }

    pub fn fail_read(self) -> Self {
        lock(&self.store).faults.read = true;
        self
    }

    pub fn fail_write(self) -> Self {
        lock(&self.store).faults.write = true;
        self
    }

    /// 每次 connect 时调用（测试用于制造并发贴卡）。
    pub fn on_connect(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        lock(&self.store).on_connect = Some(Arc::new(hook));
        self
    }

    pub fn counters(&self) -> TagCounters {
        lock(&self.store).counters
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.store).connected
    }

    pub fn stored_message(&self) -> Option<Vec<u8>> {
        lock(&self.store).ndef.as_ref().and_then(|n| n.message.clone())
    }
}

impl Tag for MemoryTag {
    fn id(&self) -> Vec<u8> {
        lock(&self.store).id.clone()
    }

    fn tech_list(&self) -> Vec<TagTech> {
        lock(&self.store).techs.clone()
    }

    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        self.ndef.as_mut().map(|tech| tech as &mut dyn NdefTech)
    }

    fn mifare_classic(&mut self) -> Option<&mut dyn MifareClassicTech> {
        self.classic.as_mut().map(|tech| tech as &mut dyn MifareClassicTech)
    }

    fn mifare_ultralight(&mut self) -> Option<&mut dyn MifareUltralightTech> {
        self.ultralight
            .as_mut()
            .map(|tech| tech as &mut dyn MifareUltralightTech)
    }
}

fn connect_store(store: &SharedStore) -> io::Result<()> {
    let hook = lock(store).on_connect.clone();
    if let Some(hook) = hook {
        hook();
    }
    let mut store = lock(store);
    store.counters.connects += 1;
    if store.faults.connect {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "tag was lost"));
    }
    if store.connected {
        return Err(io::Error::other("tag already connected"));
    }
    store.connected = true;
    Ok(())
}

fn close_store(store: &SharedStore) -> io::Result<()> {
    let mut store = lock(store);
    store.counters.closes += 1;
    store.connected = false;
    if let Some(classic) = store.classic.as_mut() {
        classic.authenticated = None;
    }
    Ok(())
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "tag not connected")
}

#[derive(Clone)]
struct MemoryNdef(SharedStore);

impl TagConnection for MemoryNdef {
    fn connect(&mut self) -> io::Result<()> {
        connect_store(&self.0)
    }

    fn close(&mut self) -> io::Result<()> {
        close_store(&self.0)
    }
}

impl NdefTech for MemoryNdef {
    fn ndef_type(&self) -> String {
        lock(&self.0)
            .ndef
            .as_ref()
            .map(|n| n.ndef_type.clone())
            .unwrap_or_default()
    }

    fn max_size(&self) -> usize {
        lock(&self.0).ndef.as_ref().map_or(0, |n| n.capacity)
    }

    fn is_writable(&self) -> bool {
        lock(&self.0).ndef.as_ref().is_some_and(|n| n.writable)
    }

    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut store = lock(&self.0);
        store.counters.reads += 1;
        if !store.connected {
            return Err(not_connected());
        }
        if store.faults.read {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "transceive failed"));
        }
        Ok(store.ndef.as_ref().and_then(|n| n.message.clone()))
    }

    fn write_message(&mut self, message: &[u8]) -> io::Result<()> {
        let mut store = lock(&self.0);
        store.counters.writes += 1;
        if !store.connected {
            return Err(not_connected());
        }
        if store.faults.write {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "transceive failed"));
        }
        let ndef = store.ndef.as_mut().ok_or_else(not_connected)?;
        if !ndef.writable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "tag is read-only"));
        }
        if message.len() > ndef.capacity {
            return Err(io::Error::other("message exceeds tag capacity"));
        }
        ndef.message = Some(message.to_vec());
        Ok(())
    }
}

#[derive(Clone)]
struct MemoryClassic(SharedStore);

impl TagConnection for MemoryClassic {
    fn connect(&mut self) -> io::Result<()> {
        connect_store(&self.0)
    }

    fn close(&mut self) -> io::Result<()> {
        close_store(&self.0)
    }
}

impl MifareClassicTech for MemoryClassic {
    fn size(&self) -> usize {
        self.block_count() * CLASSIC_BLOCK_LEN
    }

    fn sector_count(&self) -> usize {
        CLASSIC_SECTORS
    }

    fn block_count(&self) -> usize {
        CLASSIC_SECTORS * CLASSIC_BLOCKS_PER_SECTOR
    }

    fn authenticate_sector_with_key_a(&mut self, sector: u8, key: &[u8; 6]) -> io::Result<bool> {
        let mut store = lock(&self.0);
        if !store.connected {
            return Err(not_connected());
        }
        let classic = store.classic.as_mut().ok_or_else(not_connected)?;
        let expected = if sector == 0 {
            classic.sector0_key
        } else {
            MIFARE_KEY_DEFAULT
        };
        let ok = usize::from(sector) < CLASSIC_SECTORS && *key == expected;
        classic.authenticated = ok.then_some(sector);
        Ok(ok)
    }

    fn read_block(&mut self, block: u8) -> io::Result<Vec<u8>> {
        let mut store = lock(&self.0);
        store.counters.reads += 1;
        if !store.connected {
            return Err(not_connected());
        }
        let classic = store.classic.as_ref().ok_or_else(not_connected)?;
        let sector = usize::from(block) / CLASSIC_BLOCKS_PER_SECTOR;
        if classic.authenticated.map(usize::from) != Some(sector) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "sector not authenticated"));
        }
        classic
            .blocks
            .get(usize::from(block))
            .map(|b| b.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block out of range"))
    }
}

#[derive(Clone)]
struct MemoryUltralight(SharedStore);

impl TagConnection for MemoryUltralight {
    fn connect(&mut self) -> io::Result<()> {
        connect_store(&self.0)
    }

    fn close(&mut self) -> io::Result<()> {
        close_store(&self.0)
    }
}

impl MifareUltralightTech for MemoryUltralight {
    fn read_pages(&mut self, first_page: u8) -> io::Result<Vec<u8>> {
        let mut store = lock(&self.0);
        store.counters.reads += 1;
        if !store.connected {
            return Err(not_connected());
        }
        if store.faults.read {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "transceive failed"));
        }
        let pages = store.pages.as_ref().ok_or_else(not_connected)?;
        // 读取越界时回卷到第 0 页
        let mut out = Vec::with_capacity(4 * ULTRALIGHT_PAGE_LEN);
        for offset in 0..4 {
            let page = (usize::from(first_page) + offset) % pages.len();
            out.extend_from_slice(&pages[page]);
        }
        Ok(out)
    }
}
