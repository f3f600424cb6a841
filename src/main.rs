use std::collections::HashMap;
use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;

use nfc_checkin::checkin::GuestSession;
use nfc_checkin::console::{self, ConsoleCommand, HELP};
use nfc_checkin::model::CheckinSettings;
use nfc_checkin::notify::{self, Notification};
use nfc_checkin::permission::AlwaysGranted;
use nfc_checkin::pipeline::{self, ControllerCommand};
use nfc_checkin::sim::{MemoryAdapter, MemoryTag, TagKind};
use nfc_checkin::NfcController;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("NFC check-in console booting...");

    // 可选：第一个参数覆盖诊断文件目录
    let settings = match env::args().nth(1) {
        Some(dir) => CheckinSettings::with_dump_dir(dir),
        None => CheckinSettings::default(),
    };
    log::info!("diagnostic reports go to {}", settings.dump_dir.display());

    let controller = Arc::new(NfcController::new(Some(MemoryAdapter::new(true)), &settings));
    let notifier = notify::spawn_notifier_task(controller.subscribe(), |n: Notification| {
        println!("[{}] {}", n.tone.as_str(), n.text);
    });

    // 控制器线程：界面事件与贴卡事件串行处理
    let (command_tx, command_rx) = pipeline::command_channel();
    let controller_handle = pipeline::spawn_controller_loop(controller.clone(), command_rx);
    let _ = command_tx.send(ControllerCommand::Enable);
    let _ = command_tx.send(ControllerCommand::Start);

    let mut session = GuestSession::new();
    // 同一种标签复用同一张卡，写入后可再次读取
    let mut tags: HashMap<TagKind, MemoryTag> = HashMap::new();

    println!("{}", HELP);
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("stdin read failed: {}", err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match console::parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{} (type `help`)", err);
                continue;
            }
        };
        match command {
            ConsoleCommand::Scan(text) => {
                if !session.can_scan(&AlwaysGranted) {
                    println!("camera permission denied");
                    continue;
                }
                match session.on_code_detected(&text) {
                    Ok(record) => println!("guest: {}", record),
                    Err(err) => println!("{}", err),
                }
            }
            ConsoleCommand::Share => match session.current() {
                Some(record) => {
                    let _ = command_tx.send(ControllerCommand::Share(record.clone()));
                }
                None => println!("scan a guest code first"),
            },
            ConsoleCommand::Read => {
                let _ = command_tx.send(ControllerCommand::BeginRead);
            }
            ConsoleCommand::Tap(kind) => {
                let next_id = tags.len() as u8 + 1;
                let tag = tags
                    .entry(kind)
                    .or_insert_with(|| MemoryTag::from_kind(kind, &[0x04, next_id, 0x5A, 0xC1]))
                    .clone();
                let _ = command_tx.send(ControllerCommand::TagDiscovered(Some(Box::new(tag))));
            }
            ConsoleCommand::Clear => {
                session.clear();
                println!("scanning");
            }
            ConsoleCommand::Reset => {
                let _ = command_tx.send(ControllerCommand::Reset);
            }
            ConsoleCommand::Status => println!("status: {}", controller.status()),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }

    let _ = command_tx.send(ControllerCommand::Stop);
    drop(command_tx);
    if controller_handle.join().is_err() {
        log::error!("controller loop panicked");
    }
    // 发布端随控制器释放，提示任务随之退出
    drop(controller);
    let _ = notifier.join();
    log::info!("NFC check-in console stopped");
}
