use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::NfcStatus;

/// 获取锁；持锁线程 panic 后仍继续使用内部数据。
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 状态发布端，只有控制器持有。
pub struct StatusPublisher {
    current: Arc<Mutex<NfcStatus>>,
    subscribers: Mutex<Vec<Sender<NfcStatus>>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(NfcStatus::Idle)),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> NfcStatus {
        lock(&self.current).clone()
    }

    /// 替换当前状态并推送给所有订阅者。
    ///
    /// 推送期间持有状态锁，订阅者收到的顺序与状态变化顺序一致。
    pub fn publish(&self, status: NfcStatus) {
        let mut current = lock(&self.current);
        log::debug!("nfc status {} -> {}", current, status);
        *current = status.clone();
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// 新建只读观察端，只接收此后的状态变化。
    pub fn subscribe(&self) -> StatusWatcher {
        let _current = lock(&self.current);
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        StatusWatcher {
            current: self.current.clone(),
            rx,
        }
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// 状态观察端（UI 用）。发布端销毁后 `recv` 返回 `None`。
pub struct StatusWatcher {
    current: Arc<Mutex<NfcStatus>>,
    rx: Receiver<NfcStatus>,
}

impl StatusWatcher {
    pub fn current(&self) -> NfcStatus {
        lock(&self.current).clone()
    }

    /// 阻塞等待下一次状态变化。
    pub fn recv(&self) -> Option<NfcStatus> {
        self.rx.recv().ok()
    }

    /// 取出已到达但尚未消费的全部状态。
    pub fn drain(&self) -> Vec<NfcStatus> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn starts_idle_and_fans_out_in_order() {
        let publisher = StatusPublisher::new();
        assert_eq!(publisher.current(), NfcStatus::Idle);
        let first = publisher.subscribe();
        publisher.publish(NfcStatus::Ready);
        let second = publisher.subscribe();
        publisher.publish(NfcStatus::Writing);
        publisher.publish(NfcStatus::Success("done".to_string()));

        assert_eq!(
            first.drain(),
            vec![
                NfcStatus::Ready,
                NfcStatus::Writing,
                NfcStatus::Success("done".to_string())
            ]
        );
        assert_eq!(
            second.drain(),
            vec![NfcStatus::Writing, NfcStatus::Success("done".to_string())]
        );
        assert_eq!(second.current(), NfcStatus::Success("done".to_string()));
    }

    #[test]
    fn dropped_watchers_are_pruned_and_recv_ends_with_publisher() {
        let publisher = StatusPublisher::new();
        let gone = publisher.subscribe();
        drop(gone);
        let watcher = publisher.subscribe();
        publisher.publish(NfcStatus::Reading);
        assert_eq!(lock(&publisher.subscribers).len(), 1);
        drop(publisher);
        assert_eq!(watcher.recv(), Some(NfcStatus::Reading));
        assert_eq!(watcher.recv(), None);
    }
}
