//! OS permission gate.
//!
//! The set of runtime permissions depends on the Android SDK level: from
//! Android 12 (S, API 31) the engine also needs phone-state and Bluetooth
//! connect access for audio routing.

/// Request code passed to the OS permission prompt.
pub const PERMISSION_REQUEST_CODE: i32 = 22;

/// First SDK level that requires the extended permission set.
pub const NEW_PERMISSIONS_SDK: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    RecordAudio,
    Camera,
    ReadPhoneState,
    BluetoothConnect,
}

impl Permission {
    pub fn manifest_name(self) -> &'static str {
        match self {
            Permission::RecordAudio => "android.permission.RECORD_AUDIO",
            Permission::Camera => "android.permission.CAMERA",
            Permission::ReadPhoneState => "android.permission.READ_PHONE_STATE",
            Permission::BluetoothConnect => "android.permission.BLUETOOTH_CONNECT",
        }
    }
}

/// Permissions needed on a device running `sdk_int`.
pub fn required_permissions(sdk_int: u32) -> Vec<Permission> {
    let mut perms = vec![Permission::RecordAudio, Permission::Camera];
    if sdk_int >= NEW_PERMISSIONS_SDK {
        perms.push(Permission::ReadPhoneState);
        perms.push(Permission::BluetoothConnect);
    }
    perms
}

/// Host side of the permission framework.
pub trait PermissionHost: Send {
    fn is_granted(&self, permission: Permission) -> bool;

    /// Show the OS prompt. The answer comes back later through
    /// `CallScreen::on_request_permissions_result`.
    fn request(&self, permissions: &[Permission], request_code: i32);
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionGate {
    sdk_int: u32,
}

impl PermissionGate {
    pub fn new(sdk_int: u32) -> Self {
        Self { sdk_int }
    }

    pub fn required(&self) -> Vec<Permission> {
        required_permissions(self.sdk_int)
    }

    /// True only if every required permission is currently granted.
    pub fn check(&self, host: &dyn PermissionHost) -> bool {
        self.required().into_iter().all(|p| host.is_granted(p))
    }

    pub fn missing(&self, host: &dyn PermissionHost) -> Vec<Permission> {
        self.required()
            .into_iter()
            .filter(|p| !host.is_granted(*p))
            .collect()
    }

    pub fn request(&self, host: &dyn PermissionHost) {
        let perms = self.required();
        tracing::info!(sdk_int = self.sdk_int, count = perms.len(), "requesting permissions");
        host.request(&perms, PERMISSION_REQUEST_CODE);
    }
}
