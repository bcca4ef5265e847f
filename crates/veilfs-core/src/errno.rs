//! Error codes reported for hidden paths.
//!
//! A hidden path must fail the way a genuinely absent or read-only entry
//! would on the same partition. The answer depends on the path's prefix
//! class and on the syscall family that touched it.

use nix::errno::Errno;
use veilfs_common::constants::{
    APP_DATA_PREFIX, DATA_PREFIX, DEV_PREFIX, SYSTEM_PREFIX, VENDOR_PREFIX,
};
use veilfs_common::types::SyscallFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrefixClass {
    /// `/system/` and `/vendor/`.
    ReadOnlyPartition,
    /// `/storage/emulated/0/Android/data/` and `/dev/`.
    Scoped,
    /// `/data/`.
    Data,
}

impl PrefixClass {
    fn of(path: &str) -> Option<Self> {
        if path.starts_with(SYSTEM_PREFIX) || path.starts_with(VENDOR_PREFIX) {
            Some(Self::ReadOnlyPartition)
        } else if path.starts_with(APP_DATA_PREFIX) || path.starts_with(DEV_PREFIX) {
            Some(Self::Scoped)
        } else if path.starts_with(DATA_PREFIX) {
            Some(Self::Data)
        } else {
            None
        }
    }
}

/// Returns the error code a hidden `path` reports for `family`, or `None`
/// when the path's prefix keeps the caller's original error.
#[must_use]
pub fn change_error_code(path: &str, family: SyscallFamily) -> Option<Errno> {
    use SyscallFamily as F;

    let errno = match PrefixClass::of(path)? {
        PrefixClass::ReadOnlyPartition => match family {
            F::AllEnoent | F::LinkatOldname => Errno::ENOENT,
            F::Renameat2Oldname => Errno::EXDEV,
            _ => Errno::EROFS,
        },
        PrefixClass::Scoped => match family {
            F::Mknod | F::Mkdirat | F::SymlinkatNewname => Errno::EACCES,
            F::LinkatNewname | F::Renameat2Oldname | F::Renameat2Newname => Errno::EXDEV,
            _ => Errno::ENOENT,
        },
        PrefixClass::Data => match family {
            F::Mknod | F::Mkdirat | F::SymlinkatNewname => Errno::EACCES,
            F::Renameat2Newname => Errno::EXDEV,
            _ => Errno::ENOENT,
        },
    };
    Some(errno)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_is_read_only_by_default() {
        assert_eq!(
            change_error_code("/system/bin/su", SyscallFamily::Mkdirat),
            Some(Errno::EROFS)
        );
        assert_eq!(
            change_error_code("/vendor/lib/x.so", SyscallFamily::Generic),
            Some(Errno::EROFS)
        );
    }

    #[test]
    fn system_link_families() {
        assert_eq!(
            change_error_code("/system/xbin/su", SyscallFamily::LinkatOldname),
            Some(Errno::ENOENT)
        );
        assert_eq!(
            change_error_code("/system/xbin/su", SyscallFamily::Renameat2Oldname),
            Some(Errno::EXDEV)
        );
        assert_eq!(
            change_error_code("/system/xbin/su", SyscallFamily::Renameat2Newname),
            Some(Errno::EROFS)
        );
    }

    #[test]
    fn dev_and_app_data_share_a_table() {
        for path in ["/dev/ksu", "/storage/emulated/0/Android/data/pkg/x"] {
            assert_eq!(change_error_code(path, SyscallFamily::Mknod), Some(Errno::EACCES));
            assert_eq!(change_error_code(path, SyscallFamily::Rmdir), Some(Errno::ENOENT));
            assert_eq!(
                change_error_code(path, SyscallFamily::LinkatNewname),
                Some(Errno::EXDEV)
            );
            assert_eq!(
                change_error_code(path, SyscallFamily::Renameat2Oldname),
                Some(Errno::EXDEV)
            );
            assert_eq!(change_error_code(path, SyscallFamily::Generic), Some(Errno::ENOENT));
        }
    }

    #[test]
    fn data_partition_table() {
        let path = "/data/adb/modules";
        assert_eq!(
            change_error_code(path, SyscallFamily::SymlinkatNewname),
            Some(Errno::EACCES)
        );
        assert_eq!(
            change_error_code(path, SyscallFamily::LinkatNewname),
            Some(Errno::ENOENT)
        );
        assert_eq!(
            change_error_code(path, SyscallFamily::Renameat2Oldname),
            Some(Errno::ENOENT)
        );
        assert_eq!(
            change_error_code(path, SyscallFamily::Renameat2Newname),
            Some(Errno::EXDEV)
        );
    }

    #[test]
    fn unknown_prefix_is_untouched() {
        assert_eq!(change_error_code("/sdcard/Download/x", SyscallFamily::Mknod), None);
        assert_eq!(change_error_code("/system", SyscallFamily::Mknod), None);
    }
}
