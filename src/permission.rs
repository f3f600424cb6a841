/// 运行时权限。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// 扫码前需要。
    Camera,
    /// 写诊断文件前需要。
    Storage,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Camera => "camera",
            Permission::Storage => "storage",
        }
    }
}

/// 宿主提供的权限申请入口。
pub trait PermissionGate: Send + Sync {
    fn request(&self, permission: Permission) -> bool;
}

/// 无需申请的平台（桌面、测试）。
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn request(&self, _permission: Permission) -> bool {
        true
    }
}
