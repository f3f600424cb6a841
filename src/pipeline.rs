use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::controller::{Discovery, NfcController};
use crate::model::GuestRecord;
use crate::tag::{NfcAdapter, Tag};

/// 宿主发往控制器的事件（界面操作与平台贴卡回调）。
pub enum ControllerCommand {
    Enable,
    /// 界面可见。
    Start,
    /// 界面不可见。
    Stop,
    Share(GuestRecord),
    BeginRead,
    TagDiscovered(Option<Box<dyn Tag + Send>>),
    Reset,
}

impl ControllerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerCommand::Enable => "enable",
            ControllerCommand::Start => "start",
            ControllerCommand::Stop => "stop",
            ControllerCommand::Share(_) => "share",
            ControllerCommand::BeginRead => "begin_read",
            ControllerCommand::TagDiscovered(_) => "tag_discovered",
            ControllerCommand::Reset => "reset",
        }
    }
}

/// 创建命令通道。
pub fn command_channel() -> (Sender<ControllerCommand>, Receiver<ControllerCommand>) {
    mpsc::channel()
}

/// 启动控制器线程：逐条消费命令，直到所有发送端关闭。
pub fn spawn_controller_loop<A>(
    controller: Arc<NfcController<A>>,
    command_rx: Receiver<ControllerCommand>,
) -> thread::JoinHandle<()>
where
    A: NfcAdapter + 'static,
{
    thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            log::debug!("controller command: {}", command.as_str());
            apply(&controller, command);
        }
        log::info!("controller loop stopped");
    })
}

fn apply<A: NfcAdapter>(controller: &NfcController<A>, command: ControllerCommand) {
    match command {
        ControllerCommand::Enable => {
            controller.enable();
        }
        ControllerCommand::Start => controller.start(),
        ControllerCommand::Stop => controller.stop(),
        ControllerCommand::Share(record) => {
            controller.prepare_share(&record);
        }
        ControllerCommand::BeginRead => {
            controller.begin_read();
        }
        ControllerCommand::TagDiscovered(mut tag) => {
            let tag = tag.as_deref_mut().map(|tag| tag as &mut dyn Tag);
            if controller.on_tag_discovered(tag) == Discovery::Busy {
                log::warn!("tag dropped while another session was active");
            }
        }
        ControllerCommand::Reset => controller.reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckinSettings, NfcStatus};
    use crate::sim::{MemoryAdapter, MemoryTag};
    use pretty_assertions::assert_eq;

    fn record() -> GuestRecord {
        GuestRecord {
            guest_id: "G7".to_string(),
            guest_name: "Li".to_string(),
            guest_email: "li@example.com".to_string(),
            check_in: "2024-05-01".to_string(),
            check_out: "2024-05-02".to_string(),
            hotel_id: "H2".to_string(),
            room_number: "708".to_string(),
            lock_id: "L708".to_string(),
        }
    }

    #[test]
    fn commands_run_in_order_until_senders_close() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = MemoryAdapter::new(true);
        let controller = Arc::new(NfcController::new(
            Some(adapter.clone()),
            &CheckinSettings::with_dump_dir(dir.path()),
        ));
        let watcher = controller.subscribe();
        let (command_tx, command_rx) = command_channel();
        let handle = spawn_controller_loop(controller.clone(), command_rx);

        let tag = MemoryTag::ndef(&[0x04, 0x10], 512);
        for command in [
            ControllerCommand::Enable,
            ControllerCommand::Start,
            ControllerCommand::Share(record()),
            ControllerCommand::TagDiscovered(Some(Box::new(tag.clone()))),
            ControllerCommand::TagDiscovered(Some(Box::new(tag.clone()))),
            ControllerCommand::Stop,
        ] {
            command_tx.send(command).unwrap();
        }
        drop(command_tx);
        handle.join().unwrap();

        assert_eq!(
            watcher.drain(),
            vec![
                NfcStatus::Ready,
                NfcStatus::Writing,
                NfcStatus::Success("guest data written to tag".to_string()),
                NfcStatus::Reading,
                NfcStatus::Validating(record()),
            ]
        );
        assert!(adapter.dispatch().is_none());
        assert_eq!(tag.counters().writes, 1);
    }

    #[test]
    fn missing_tag_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(NfcController::new(
            Some(MemoryAdapter::new(true)),
            &CheckinSettings::with_dump_dir(dir.path()),
        ));
        let (command_tx, command_rx) = command_channel();
        let handle = spawn_controller_loop(controller.clone(), command_rx);

        command_tx.send(ControllerCommand::Enable).unwrap();
        command_tx.send(ControllerCommand::TagDiscovered(None)).unwrap();
        command_tx.send(ControllerCommand::BeginRead).unwrap();
        command_tx.send(ControllerCommand::Reset).unwrap();
        drop(command_tx);
        handle.join().unwrap();

        assert_eq!(controller.status(), NfcStatus::Idle);
    }
}
