//! System-wide constants and limits.

/// Maximum length in bytes of a registered path, terminator excluded.
pub const MAX_LEN_PATHNAME: usize = 255;

/// Default hard cap on the number of registered sus mounts.
pub const DEFAULT_MAX_SUS_MOUNTS: usize = 400;

/// Default bound on hidden mount ids recorded per process.
pub const DEFAULT_MAX_HIDDEN_MOUNT_IDS: usize = 400;

/// Maximum length in bytes of a single uname field.
pub const UTS_FIELD_LEN: usize = 64;

/// Wire sentinel marking a uname field as "leave the real value alone".
pub const UNAME_UNSET: &str = "default";

/// First uid handed out to Android applications.
pub const FIRST_APPLICATION_UID: u32 = 10_000;

/// Filesystem type that checked unmounts are allowed to peel off.
pub const OVERLAY_FS_TYPE: &str = "overlay";

/// Path prefixes whose hidden entries report a rewritten error code.
pub const SYSTEM_PREFIX: &str = "/system/";
/// Vendor partition prefix.
pub const VENDOR_PREFIX: &str = "/vendor/";
/// Per-app external data prefix.
pub const APP_DATA_PREFIX: &str = "/storage/emulated/0/Android/data/";
/// Device node prefix.
pub const DEV_PREFIX: &str = "/dev/";
/// Internal data partition prefix.
pub const DATA_PREFIX: &str = "/data/";

/// Application name used in CLI output.
pub const APP_NAME: &str = "veilfs";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "veilctl";
