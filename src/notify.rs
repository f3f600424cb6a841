use std::thread;

use crate::model::NfcStatus;
use crate::status::StatusWatcher;

/// 提示音色（宿主映射为 toast 颜色、震动或指示灯）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Prompt,
    Progress,
    Success,
    Error,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Prompt => "prompt",
            Tone::Progress => "progress",
            Tone::Success => "success",
            Tone::Error => "error",
        }
    }
}

/// 面向用户的一条提示。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub tone: Tone,
    pub text: String,
}

impl Notification {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

/// 提示输出端。
pub trait NotificationSink: Send {
    fn notify(&mut self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: FnMut(Notification) + Send,
{
    fn notify(&mut self, notification: Notification) {
        self(notification)
    }
}

/// 状态 → 用户提示。Idle 与 Writing 不提示。
pub fn notification_for(status: &NfcStatus) -> Option<Notification> {
    match status {
        NfcStatus::Idle | NfcStatus::Writing => None,
        NfcStatus::Ready => Some(Notification::new(
            Tone::Prompt,
            "hold the device near an NFC tag to write the key",
        )),
        NfcStatus::Reading => Some(Notification::new(
            Tone::Prompt,
            "hold the device near an NFC card to read it",
        )),
        NfcStatus::Validating(record) => Some(Notification::new(
            Tone::Progress,
            format!("validating reservation for room {}", record.room_number),
        )),
        NfcStatus::Success(message) => Some(Notification::new(Tone::Success, message.clone())),
        NfcStatus::Error(message) => Some(Notification::new(Tone::Error, message.clone())),
    }
}

/// 启动提示任务：把状态变化转成提示，发布端销毁后退出。
pub fn spawn_notifier_task<S>(watcher: StatusWatcher, mut sink: S) -> thread::JoinHandle<()>
where
    S: NotificationSink + 'static,
{
    thread::spawn(move || {
        while let Some(status) = watcher.recv() {
            if let Some(notification) = notification_for(&status) {
                sink.notify(notification);
            }
        }
        log::debug!("notifier task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GuestRecord;
    use crate::status::StatusPublisher;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;

    #[test]
    fn maps_each_status() {
        assert_eq!(notification_for(&NfcStatus::Idle), None);
        assert_eq!(notification_for(&NfcStatus::Writing), None);
        assert_eq!(notification_for(&NfcStatus::Ready).unwrap().tone, Tone::Prompt);
        assert!(notification_for(&NfcStatus::Reading)
            .unwrap()
            .text
            .contains("read"));

        let record = GuestRecord {
            guest_id: "G1".to_string(),
            guest_name: "Ana".to_string(),
            guest_email: "a@x.com".to_string(),
            check_in: "2024-01-01".to_string(),
            check_out: "2024-01-03".to_string(),
            hotel_id: "H1".to_string(),
            room_number: "101".to_string(),
            lock_id: "L1".to_string(),
        };
        assert_eq!(
            notification_for(&NfcStatus::Validating(record)),
            Some(Notification::new(
                Tone::Progress,
                "validating reservation for room 101"
            ))
        );
        assert_eq!(
            notification_for(&NfcStatus::Error("tag empty".to_string())),
            Some(Notification::new(Tone::Error, "tag empty"))
        );
    }

    #[test]
    fn task_forwards_until_publisher_dropped() {
        let publisher = StatusPublisher::new();
        let (tx, rx) = mpsc::channel();
        let handle = spawn_notifier_task(publisher.subscribe(), move |n: Notification| {
            let _ = tx.send(n);
        });

        publisher.publish(NfcStatus::Ready);
        publisher.publish(NfcStatus::Writing);
        publisher.publish(NfcStatus::Success("done".to_string()));
        drop(publisher);
        handle.join().unwrap();

        let tones: Vec<Tone> = rx.try_iter().map(|n| n.tone).collect();
        assert_eq!(tones, vec![Tone::Prompt, Tone::Success]);
    }
}
