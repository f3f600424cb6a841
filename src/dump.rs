//! 诊断读卡：按所有支持的技术读取标签并生成文本报告。

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::error::NfcError;
use crate::ndef::{self, NdefMessage};
use crate::tag::{
    to_hex, MifareClassicTech, MifareUltralightTech, NdefTech, Tag, TagSession, MIFARE_KEY_DEFAULT,
};

/// 生成多技术诊断报告。单项技术读取失败只写入报告，不中断。
pub fn build_report(tag: &mut dyn Tag) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tag ID: {}", to_hex(&tag.id()));

    if let Some(ndef) = tag.ndef() {
        describe_ndef(ndef, &mut out);
    }
    if let Some(classic) = tag.mifare_classic() {
        describe_mifare_classic(classic, &mut out);
    }
    if let Some(ultralight) = tag.mifare_ultralight() {
        describe_mifare_ultralight(ultralight, &mut out);
    }

    let _ = writeln!(out, "\nSupported technologies:");
    for tech in tag.tech_list() {
        let _ = writeln!(out, "- {}", tech.as_str());
    }
    out
}

fn describe_ndef(ndef: &mut dyn NdefTech, out: &mut String) {
    let _ = writeln!(out, "\nTag type: NDEF");
    let _ = writeln!(out, "NDEF type: {}", ndef.ndef_type());
    let _ = writeln!(out, "Max capacity: {} bytes", ndef.max_size());
    match read_ndef(ndef) {
        Ok(Some(message)) => {
            let _ = writeln!(out, "\nNDEF content:");
            for record in &message.records {
                let _ = writeln!(
                    out,
                    "Record type: {}",
                    String::from_utf8_lossy(&record.record_type)
                );
                let _ = writeln!(out, "Payload: {}", String::from_utf8_lossy(&record.payload));
            }
        }
        Ok(None) => {
            let _ = writeln!(out, "\nNDEF tag is empty");
        }
        Err(err) => {
            let _ = writeln!(out, "\nNDEF read error: {}", err);
        }
    }
}

fn read_ndef(ndef: &mut dyn NdefTech) -> Result<Option<NdefMessage>, NfcError> {
    let mut session = TagSession::open(ndef)?;
    let Some(bytes) = session.read_message()? else {
        return Ok(None);
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    let message = ndef::decode_message(&bytes)?;
    Ok((!message.is_empty_message()).then_some(message))
}

fn describe_mifare_classic(classic: &mut dyn MifareClassicTech, out: &mut String) {
    let _ = writeln!(out, "\nTag type: MIFARE Classic");
    let _ = writeln!(
        out,
        "Size: {} bytes ({} blocks)",
        classic.size(),
        classic.block_count()
    );
    let _ = writeln!(out, "Sectors: {}", classic.sector_count());
    match read_first_block(classic) {
        Ok(Some(block)) => {
            let _ = writeln!(out, "Block 0: {}", to_hex(&block));
        }
        Ok(None) => {
            let _ = writeln!(out, "Sector 0 does not accept the default key");
        }
        Err(err) => {
            let _ = writeln!(out, "MIFARE Classic read error: {}", err);
        }
    }
}

/// 用默认 Key A 认证扇区 0 后读取块 0（厂商块）。
fn read_first_block(classic: &mut dyn MifareClassicTech) -> Result<Option<Vec<u8>>, NfcError> {
    let mut session = TagSession::open(classic)?;
    if !session.authenticate_sector_with_key_a(0, &MIFARE_KEY_DEFAULT)? {
        return Ok(None);
    }
    Ok(Some(session.read_block(0)?))
}

fn describe_mifare_ultralight(ultralight: &mut dyn MifareUltralightTech, out: &mut String) {
    let _ = writeln!(out, "\nTag type: MIFARE Ultralight");
    let pages = TagSession::open(ultralight)
        .and_then(|mut session| session.read_pages(0));
    match pages {
        Ok(pages) => {
            let _ = writeln!(out, "Pages 0-3: {}", to_hex(&pages));
        }
        Err(err) => {
            let _ = writeln!(out, "MIFARE Ultralight read error: {}", err);
        }
    }
}

/// 诊断文件名：`nfc_data_<yyyyMMdd_HHmmss>.txt`。
pub fn report_file_name(at: &NaiveDateTime) -> String {
    format!("nfc_data_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// 诊断报告落盘。
#[derive(Clone, Debug)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 写入报告文件（目录不存在时创建），返回文件路径。
    ///
    /// 同一秒内的多份报告依次加 `_1`、`_2` 后缀，不覆盖已有文件。
    pub fn persist(&self, report: &str, at: NaiveDateTime) -> Result<PathBuf, NfcError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| NfcError::Persistence(format!("{}: {}", self.dir.display(), err)))?;
        let base = report_file_name(&at);
        let stem = base.trim_end_matches(".txt");
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => base.clone(),
                n => format!("{}_{}.txt", stem, n),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(report.as_bytes()).map_err(|err| {
                        NfcError::Persistence(format!("{}: {}", path.display(), err))
                    })?;
                    log::info!("tag report saved to {}", path.display());
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => {
                    return Err(NfcError::Persistence(format!("{}: {}", path.display(), err)))
                }
            }
        }
    }
}
