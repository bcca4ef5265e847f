//! Domain primitive types used across the veilfs workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kernel process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(i32);

impl Pid {
    /// Wraps a raw process id.
    #[must_use]
    pub const fn new(pid: i32) -> Self {
        Self(pid)
    }

    /// Returns the raw process id.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Real user identifier of a querying process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(u32);

impl Uid {
    /// Wraps a raw uid.
    #[must_use]
    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    /// Returns the raw uid.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials of the process on whose behalf a query is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    /// Process id, used to key per-process mount-id records.
    pub pid: Pid,
    /// User id, fed to the target-identity policy.
    pub uid: Uid,
}

impl Caller {
    /// Builds a caller from raw ids.
    #[must_use]
    pub const fn new(pid: i32, uid: u32) -> Self {
        Self {
            pid: Pid::new(pid),
            uid: Uid::new(uid),
        }
    }
}

/// Device number in the kernel's internal `major << 20 | minor` form.
///
/// Every comparison inside the engine happens on this representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawDev(u32);

impl RawDev {
    /// Number of bits reserved for the minor number.
    pub const MINOR_BITS: u32 = 20;
    /// Mask selecting the minor number.
    pub const MINOR_MASK: u32 = (1 << Self::MINOR_BITS) - 1;

    /// Builds a raw device number from its major and minor parts.
    #[must_use]
    pub const fn from_parts(major: u32, minor: u32) -> Self {
        Self((major << Self::MINOR_BITS) | (minor & Self::MINOR_MASK))
    }

    /// Wraps an already packed raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the packed raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the major number.
    #[must_use]
    pub const fn major(self) -> u32 {
        self.0 >> Self::MINOR_BITS
    }

    /// Returns the minor number.
    #[must_use]
    pub const fn minor(self) -> u32 {
        self.0 & Self::MINOR_MASK
    }
}

impl fmt::Display for RawDev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Device number as user space sees it in `st_dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedDev(u64);

impl EncodedDev {
    /// Wraps an encoded value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the encoded value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EncodedDev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Encoding used to pack device numbers into `st_dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEncoding {
    /// 64-bit `huge_encode_dev` layout (low 32 bits carry the `new` layout).
    Huge,
    /// 32-bit `new_encode_dev` layout.
    New,
    /// 16-bit legacy `old_encode_dev` layout (8-bit major and minor).
    Old,
}

impl DeviceEncoding {
    /// Returns the encoding the host platform's stat shape uses.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(any(target_arch = "mips", target_arch = "mips64")) {
            Self::New
        } else {
            Self::Huge
        }
    }
}

impl Default for DeviceEncoding {
    fn default() -> Self {
        Self::native()
    }
}

/// Seconds and nanoseconds of a stat timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the epoch.
    pub sec: i64,
    /// Nanosecond part.
    pub nsec: i64,
}

impl Timestamp {
    /// Builds a timestamp from its parts.
    #[must_use]
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }
}

/// Virtual memory area flag bits as carried by a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmFlags(u64);

impl VmFlags {
    /// Mapping is readable.
    pub const READ: u64 = 0x0000_0001;
    /// Mapping is writable.
    pub const WRITE: u64 = 0x0000_0002;
    /// Mapping is executable.
    pub const EXEC: u64 = 0x0000_0004;
    /// Mapping may be shared.
    pub const MAYSHARE: u64 = 0x0000_0080;
    /// The protection bits that rules compare and spoof.
    pub const PROT_MASK: u64 = Self::READ | Self::WRITE | Self::EXEC | Self::MAYSHARE;

    /// Wraps raw flag bits.
    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns only the protection bits.
    #[must_use]
    pub const fn prot(self) -> u64 {
        self.0 & Self::PROT_MASK
    }

    /// Returns whether both flag sets agree on every protection bit.
    #[must_use]
    pub const fn same_prot(self, other: Self) -> bool {
        self.prot() == other.prot()
    }

    /// Forces every protection bit to the value it has in `spoofed`,
    /// leaving all other bits untouched.
    #[must_use]
    pub const fn with_prot_of(self, spoofed: Self) -> Self {
        Self((self.0 & !Self::PROT_MASK) | spoofed.prot())
    }
}

impl fmt::Display for VmFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: u64, c: char| if self.0 & bit == 0 { '-' } else { c };
        write!(
            f,
            "{}{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x'),
            flag(Self::MAYSHARE, 's'),
        )
    }
}

/// Syscall family an intercepted path operation belongs to.
///
/// Hidden paths report a family-specific error code so that the denial
/// looks like what the real filesystem would have answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyscallFamily {
    /// Lookups that must always look like a missing entry.
    AllEnoent,
    /// `mknod(2)` family.
    Mknod,
    /// `mkdirat(2)` family.
    Mkdirat,
    /// `rmdir(2)` family.
    Rmdir,
    /// `unlinkat(2)` family.
    Unlinkat,
    /// New-name side of `symlinkat(2)`.
    SymlinkatNewname,
    /// Old-name side of `linkat(2)`.
    LinkatOldname,
    /// New-name side of `linkat(2)`.
    LinkatNewname,
    /// Old-name side of `renameat2(2)`.
    Renameat2Oldname,
    /// New-name side of `renameat2(2)`.
    Renameat2Newname,
    /// Any other intercepted syscall.
    Generic,
}

impl FromStr for SyscallFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_enoent" => Ok(Self::AllEnoent),
            "mknod" => Ok(Self::Mknod),
            "mkdirat" => Ok(Self::Mkdirat),
            "rmdir" => Ok(Self::Rmdir),
            "unlinkat" => Ok(Self::Unlinkat),
            "symlinkat_newname" => Ok(Self::SymlinkatNewname),
            "linkat_oldname" => Ok(Self::LinkatOldname),
            "linkat_newname" => Ok(Self::LinkatNewname),
            "renameat2_oldname" => Ok(Self::Renameat2Oldname),
            "renameat2_newname" => Ok(Self::Renameat2Newname),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown syscall family: {other}")),
        }
    }
}

/// How a forced-unmount target is taken down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MountMode {
    /// Plain `umount`.
    Plain,
    /// Lazy detach (`MNT_DETACH`).
    Detach,
    /// Lazy detach, only if the mount is an overlay.
    CheckedDetach,
}

impl MountMode {
    /// Returns whether the unmount should be lazy.
    #[must_use]
    pub const fn is_detach(self) -> bool {
        matches!(self, Self::Detach | Self::CheckedDetach)
    }
}

impl TryFrom<u32> for MountMode {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Detach),
            2 => Ok(Self::CheckedDetach),
            other => Err(format!("invalid mount mode: {other}")),
        }
    }
}

impl From<MountMode> for u32 {
    fn from(mode: MountMode) -> Self {
        match mode {
            MountMode::Plain => 0,
            MountMode::Detach => 1,
            MountMode::CheckedDetach => 2,
        }
    }
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Detach => write!(f, "detach"),
            Self::CheckedDetach => write!(f, "checked-detach"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_dev_splits_major_and_minor() {
        let dev = RawDev::from_parts(253, 0x1_2345);
        assert_eq!(dev.major(), 253);
        assert_eq!(dev.minor(), 0x1_2345);
        assert_eq!(dev.to_string(), "253:74565");
    }

    #[test]
    fn vm_flags_spoof_only_touches_prot_bits() {
        let current = VmFlags::new(VmFlags::READ | VmFlags::EXEC | 0x100);
        let spoofed = VmFlags::new(VmFlags::READ | VmFlags::WRITE);
        let result = current.with_prot_of(spoofed);
        assert_eq!(result.bits(), VmFlags::READ | VmFlags::WRITE | 0x100);
    }

    #[test]
    fn vm_flags_display() {
        let flags = VmFlags::new(VmFlags::READ | VmFlags::EXEC);
        assert_eq!(flags.to_string(), "r-x-");
    }

    #[test]
    fn mount_mode_rejects_unknown_values() {
        assert_eq!(MountMode::try_from(1), Ok(MountMode::Detach));
        assert!(MountMode::try_from(7).is_err());
    }

    #[test]
    fn mount_mode_deserializes_from_integer() {
        let mode: MountMode = serde_json::from_str("2").unwrap();
        assert_eq!(mode, MountMode::CheckedDetach);
        assert!(serde_json::from_str::<MountMode>("9").is_err());
    }

    #[test]
    fn syscall_family_parses_names() {
        assert_eq!("rmdir".parse::<SyscallFamily>(), Ok(SyscallFamily::Rmdir));
        assert!("open".parse::<SyscallFamily>().is_err());
    }
}
