use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Local;

use crate::dump::{self, ReportWriter};
use crate::error::NfcError;
use crate::guest_data::{self, GUEST_MIME};
use crate::model::{CheckinSettings, DispatchConfig, GuestRecord, NfcStatus};
use crate::ndef::{self, NdefMessage, NdefRecord};
use crate::permission::{AlwaysGranted, Permission, PermissionGate};
use crate::status::{lock, StatusPublisher, StatusWatcher};
use crate::tag::{to_hex, NfcAdapter, Tag, TagSession};
use crate::validator::LockValidator;

/// 写卡成功提示。
pub const MSG_WRITTEN: &str = "guest data written to tag";

/// 一次贴卡事件的处理结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// 已处理，结果见状态。
    Handled,
    /// 上一次贴卡尚未结束，本次被拒绝。
    Busy,
    /// NFC 未启用，忽略。
    Ignored,
}

/// 控制器可变状态（受锁保护）。
struct ControllerState<A> {
    adapter: Option<A>,
    enabled: bool,
    dispatching: bool,
    pending: Option<NdefMessage>,
    dump_armed: bool,
}

/// 单槽占用标记：同一时刻只允许一个标签会话。
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// NFC 会话控制器：适配器生命周期、前台分发、标签读写与状态流转。
pub struct NfcController<A: NfcAdapter> {
    state: Mutex<ControllerState<A>>,
    status: StatusPublisher,
    in_flight: AtomicBool,
    dispatch: DispatchConfig,
    reports: ReportWriter,
    validator: Option<Box<dyn LockValidator>>,
    permissions: Box<dyn PermissionGate>,
}

impl<A: NfcAdapter> NfcController<A> {
    /// 创建控制器，状态为 Idle。`adapter` 为 `None` 表示设备不支持 NFC。
    pub fn new(adapter: Option<A>, settings: &CheckinSettings) -> Self {
        Self {
            state: Mutex::new(ControllerState {
                adapter,
                enabled: false,
                dispatching: false,
                pending: None,
                dump_armed: false,
            }),
            status: StatusPublisher::new(),
            in_flight: AtomicBool::new(false),
            dispatch: settings.dispatch.clone(),
            reports: ReportWriter::new(settings.dump_dir.clone()),
            validator: None,
            permissions: Box::new(AlwaysGranted),
        }
    }

    /// 安装门锁校验服务；未安装时读卡停留在 Validating。
    pub fn with_validator(mut self, validator: impl LockValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_permissions(mut self, permissions: impl PermissionGate + 'static) -> Self {
        self.permissions = Box::new(permissions);
        self
    }

    pub fn status(&self) -> NfcStatus {
        self.status.current()
    }

    pub fn subscribe(&self) -> StatusWatcher {
        self.status.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    pub fn is_dispatching(&self) -> bool {
        self.lock_state().dispatching
    }

    pub fn has_pending_message(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    /// 检查适配器是否存在且已开启；失败时其余操作均不生效，直到再次启用成功。
    pub fn enable(&self) -> bool {
        let mut state = self.lock_state();
        let checked = match state.adapter.as_ref() {
            None => Err(NfcError::AdapterUnavailable),
            Some(adapter) if !adapter.is_enabled() => Err(NfcError::AdapterDisabled),
            Some(_) => Ok(()),
        };
        state.enabled = checked.is_ok();
        match checked {
            Ok(()) => {
                log::info!("NFC adapter enabled");
                // 清除之前的启用失败提示
                if matches!(self.status.current(), NfcStatus::Error(_)) {
                    self.status.publish(NfcStatus::Idle);
                }
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// 宿主界面可见时调用：注册前台分发。
    pub fn start(&self) {
        let mut state = self.lock_state();
        if !state.enabled || state.dispatching {
            return;
        }
        let Some(adapter) = state.adapter.as_mut() else {
            return;
        };
        match adapter.enable_foreground_dispatch(&self.dispatch) {
            Ok(()) => {
                state.dispatching = true;
                log::info!("foreground dispatch enabled");
            }
            Err(err) => self.fail(NfcError::Dispatch(err)),
        }
    }

    /// 宿主界面不可见时调用：注销前台分发。
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if !state.dispatching {
            return;
        }
        if let Some(adapter) = state.adapter.as_mut() {
            adapter.disable_foreground_dispatch();
        }
        state.dispatching = false;
        log::info!("foreground dispatch disabled");
    }

    /// 准备写卡：编码预订数据并挂起，等待下一次贴卡。
    ///
    /// 已有挂起消息会被覆盖；尚未执行的诊断读卡随状态离开 Reading 而取消。
    pub fn prepare_share(&self, record: &GuestRecord) -> bool {
        let mut state = self.lock_state();
        let prepared = if state.enabled {
            encode_share(record)
        } else {
            Err(NfcError::AdapterDisabled)
        };
        match prepared {
            Ok(message) => {
                log::info!(
                    "guest data queued for tag write: {} ({} bytes)",
                    record,
                    message.encoded_len()
                );
                state.pending = Some(message);
                state.dump_armed = false;
                self.status.publish(NfcStatus::Ready);
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// 诊断读卡：状态保持 Reading 时，下一次贴卡导出标签全部信息。
    pub fn begin_read(&self) -> bool {
        let mut state = self.lock_state();
        if !state.enabled {
            self.fail(NfcError::AdapterDisabled);
            return false;
        }
        state.dump_armed = true;
        self.status.publish(NfcStatus::Reading);
        true
    }

    /// 外部复位：丢弃挂起消息与诊断请求。
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.pending = None;
        state.dump_armed = false;
        self.status.publish(NfcStatus::Idle);
    }

    /// 处理一次贴卡。有挂起消息则写卡，否则读卡并交给门锁校验。
    pub fn on_tag_discovered(&self, tag: Option<&mut dyn Tag>) -> Discovery {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            log::warn!("tag discovery rejected: another tag session is in progress");
            return Discovery::Busy;
        };
        let mut state = self.lock_state();
        if !state.enabled {
            log::warn!("tag discovery ignored: NFC is not enabled");
            return Discovery::Ignored;
        }
        let Some(tag) = tag else {
            self.fail(NfcError::NoTag);
            return Discovery::Handled;
        };
        log::info!("tag discovered: id={}", to_hex(&tag.id()));

        // 标签 I/O 期间不持有状态锁
        let pending = state.pending.clone();
        // 诊断请求只对紧接着的一次贴卡有效
        let dump = std::mem::take(&mut state.dump_armed) && pending.is_none();
        drop(state);

        match pending {
            Some(message) => match self.write_tag(tag, &message) {
                Ok(()) => {
                    self.clear_pending(&message);
                    log::info!("guest data written ({} bytes)", message.encoded_len());
                    self.status.publish(NfcStatus::Success(MSG_WRITTEN.to_string()));
                }
                Err(err) => self.fail(err),
            },
            None if dump => self.dump_tag(tag),
            None => match self.read_tag(tag) {
                Ok(record) => self.validate(record),
                Err(err) => self.fail(err),
            },
        }
        Discovery::Handled
    }

    /// 写卡完成后清除挂起消息；写卡期间被新消息覆盖时保留新消息。
    fn clear_pending(&self, written: &NdefMessage) {
        let mut state = self.lock_state();
        if state.pending.as_ref() == Some(written) {
            state.pending = None;
        }
    }

    fn write_tag(&self, tag: &mut dyn Tag, message: &NdefMessage) -> Result<(), NfcError> {
        let ndef = tag.ndef().ok_or(NfcError::TagIncompatible)?;
        let mut session = TagSession::open(ndef)?;
        self.status.publish(NfcStatus::Writing);
        if !session.is_writable() {
            return Err(NfcError::TagNotWritable);
        }
        let needed = message.encoded_len();
        let capacity = session.max_size();
        if needed > capacity {
            return Err(NfcError::TagCapacityExceeded { needed, capacity });
        }
        session.write_message(&message.encode())?;
        Ok(())
    }

    fn read_tag(&self, tag: &mut dyn Tag) -> Result<GuestRecord, NfcError> {
        let ndef = tag.ndef().ok_or(NfcError::TagIncompatible)?;
        let mut session = TagSession::open(ndef)?;
        self.status.publish(NfcStatus::Reading);
        let bytes = session.read_message()?.ok_or(NfcError::TagEmpty)?;
        if bytes.is_empty() {
            return Err(NfcError::TagEmpty);
        }
        let message = ndef::decode_message(&bytes)?;
        if message.is_empty_message() {
            return Err(NfcError::TagEmpty);
        }
        let record = message
            .find_mime_payload(GUEST_MIME)
            .and_then(|payload| std::str::from_utf8(payload).ok())
            .ok_or(NfcError::PayloadParse)
            .and_then(|text| {
                guest_data::parse_tag_payload(text).map_err(|err| {
                    log::warn!("guest payload rejected: {}", err);
                    NfcError::PayloadParse
                })
            })?;
        self.status.publish(NfcStatus::Validating(record.clone()));
        Ok(record)
    }

    fn validate(&self, record: GuestRecord) {
        let Some(validator) = self.validator.as_ref() else {
            log::info!("guest data read, awaiting lock validation: {}", record);
            return;
        };
        match validator.validate(&record) {
            Ok(message) => {
                log::info!("lock validated for room {}: {}", record.room_number, message);
                self.status.publish(NfcStatus::Success(message));
            }
            Err(err) => {
                log::warn!("lock validation failed for room {}: {}", record.room_number, err);
                self.status.publish(NfcStatus::Error(err.to_string()));
            }
        }
    }

    fn dump_tag(&self, tag: &mut dyn Tag) {
        let report = dump::build_report(tag);
        match self.save_report(&report) {
            Ok(path) => {
                let message = format!("tag data saved to: {}", path.display());
                self.status.publish(NfcStatus::Success(message));
            }
            Err(err) => self.fail(err),
        }
    }

    fn save_report(&self, report: &str) -> Result<PathBuf, NfcError> {
        if !self.permissions.request(Permission::Storage) {
            return Err(NfcError::Persistence("storage permission denied".to_string()));
        }
        self.reports.persist(report, Local::now().naive_local())
    }

    fn fail(&self, err: NfcError) {
        log::warn!("NFC operation failed: {}", err);
        self.status.publish(NfcStatus::Error(err.to_string()));
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState<A>> {
        lock(&self.state)
    }
}

/// 预订数据 → 单条 `application/json` MIME 记录。
fn encode_share(record: &GuestRecord) -> Result<NdefMessage, NfcError> {
    let json = guest_data::serialize(record).map_err(NfcError::Encode)?;
    Ok(NdefMessage::new(vec![NdefRecord::mime(
        GUEST_MIME,
        json.into_bytes(),
    )]))
}
