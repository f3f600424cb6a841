// 模块划分：数据模型、标签编解码、平台接口、控制器与宿主接线
pub mod checkin;
pub mod console;
pub mod controller;
pub mod dump;
pub mod error;
pub mod guest_data;
pub mod model;
pub mod ndef;
pub mod notify;
pub mod permission;
pub mod pipeline;
pub mod sim;
pub mod status;
pub mod tag;
pub mod validator;

pub use controller::{Discovery, NfcController};
pub use error::NfcError;
pub use model::{CheckinSettings, GuestRecord, NfcStatus};
