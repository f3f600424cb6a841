use crate::controller::NfcController;
use crate::guest_data::{self, GuestDataError};
use crate::model::GuestRecord;
use crate::permission::{Permission, PermissionGate};
use crate::tag::NfcAdapter;

/// 入住界面会话：保存最近一次扫码得到的预订数据。
///
/// 没有数据时处于扫码状态，有数据时展示详情并可写卡。
#[derive(Clone, Debug, Default)]
pub struct GuestSession {
    current: Option<GuestRecord>,
}

impl GuestSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 二维码识别回调。解析失败时清空当前数据并返回错误。
    pub fn on_code_detected(&mut self, text: &str) -> Result<&GuestRecord, GuestDataError> {
        match guest_data::parse_scanned(text) {
            Ok(record) => {
                log::info!("guest code scanned: {}", record);
                Ok(self.current.insert(record))
            }
            Err(err) => {
                log::warn!("scanned code rejected: {}", err);
                self.current = None;
                Err(err)
            }
        }
    }

    pub fn current(&self) -> Option<&GuestRecord> {
        self.current.as_ref()
    }

    /// 关闭详情，回到扫码。
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn is_scanning(&self) -> bool {
        self.current.is_none()
    }

    pub fn can_scan(&self, permissions: &dyn PermissionGate) -> bool {
        permissions.request(Permission::Camera)
    }

    /// 把当前数据交给控制器，等待贴卡写入。没有数据时返回 false。
    pub fn share<A: NfcAdapter>(&self, controller: &NfcController<A>) -> bool {
        match self.current.as_ref() {
            Some(record) => controller.prepare_share(record),
            None => false,
        }
    }
}
