//! 控制台命令解析（桌面宿主用 stdin 模拟扫码与贴卡）。

use thiserror::Error;

use crate::sim::TagKind;

pub const HELP: &str = "\
commands:
  scan <json>   scan a guest QR code (checkInDate/checkOutDate keys)
  share         queue the scanned guest data for the next tag
  read          dump the next tag to a diagnostic file
  tap <kind>    present a tag: blank, readonly, small, classic, ultralight, plain
  clear         dismiss the guest details and scan again
  reset         drop any pending write or read
  status        show the current NFC status
  help          show this text
  quit          exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan(String),
    Share,
    Read,
    Tap(TagKind),
    Clear,
    Reset,
    Status,
    Help,
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("unknown tag kind: {0}")]
    UnknownTagKind(String),
}

/// 解析一行输入。命令名不区分大小写，`scan` 之后的内容原样保留。
pub fn parse_command(line: &str) -> Result<ConsoleCommand, CommandError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    if name.is_empty() {
        return Err(CommandError::Empty);
    }
    let command = match name.to_ascii_lowercase().as_str() {
        "scan" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("scan"));
            }
            ConsoleCommand::Scan(rest.to_string())
        }
        "tap" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("tap"));
            }
            let kind =
                TagKind::parse(rest).ok_or_else(|| CommandError::UnknownTagKind(rest.to_string()))?;
            ConsoleCommand::Tap(kind)
        }
        "share" | "write" => ConsoleCommand::Share,
        "read" => ConsoleCommand::Read,
        "clear" => ConsoleCommand::Clear,
        "reset" => ConsoleCommand::Reset,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}
