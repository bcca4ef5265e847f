//! Formatted output helpers for CLI commands.

use std::fmt::Write as _;

use veilfs_core::device::DeviceCodec;
use veilfs_core::engine::StoreStats;
use veilfs_core::kstat::StatBuf;

/// Renders per-store record counts, one store per line.
#[must_use]
pub fn stats_table(stats: &StoreStats) -> String {
    let rows = [
        ("sus_path", stats.sus_paths),
        ("sus_mount", stats.sus_mounts),
        ("sus_kstat", stats.kstat_rules),
        ("sus_maps", stats.maps_rules),
        ("sus_proc_fd_link", stats.fd_link_rules),
        ("try_umount", stats.try_umounts),
    ];
    let mut out = format!("{:<18} {:>6}\n", "STORE", "COUNT");
    for (store, count) in rows {
        let _ = writeln!(out, "{store:<18} {count:>6}");
    }
    out
}

/// Renders the real and spoofed stat of a file side by side.
#[must_use]
pub fn stat_table(real: &StatBuf, spoofed: &StatBuf, codec: &dyn DeviceCodec) -> String {
    let dev = |s: &StatBuf| codec.decode(s.dev).to_string();
    let time = |t: veilfs_common::types::Timestamp| format!("{}.{:09}", t.sec, t.nsec);
    let rows = [
        ("ino", real.ino.to_string(), spoofed.ino.to_string()),
        ("dev", dev(real), dev(spoofed)),
        ("nlink", real.nlink.to_string(), spoofed.nlink.to_string()),
        ("atime", time(real.atime), time(spoofed.atime)),
        ("mtime", time(real.mtime), time(spoofed.mtime)),
        ("ctime", time(real.ctime), time(spoofed.ctime)),
    ];
    let mut out = format!("{:<6} {:<22} {:<22}\n", "FIELD", "REAL", "SPOOFED");
    for (field, before, after) in rows {
        let _ = writeln!(out, "{field:<6} {before:<22} {after:<22}");
    }
    out
}

#[cfg(test)]
mod tests {
    use veilfs_common::types::{DeviceEncoding, EncodedDev, RawDev, Timestamp};

    use super::*;

    #[test]
    fn stats_table_lists_every_rule_store() {
        let stats = StoreStats {
            sus_paths: 3,
            sus_mounts: 1,
            ..StoreStats::default()
        };
        let table = stats_table(&stats);
        assert_eq!(table.lines().count(), 7);
        assert!(table.contains("sus_path                3"));
        assert!(table.contains("try_umount              0"));
    }

    #[test]
    fn stat_table_shows_decoded_devices_and_timestamps() {
        let codec = DeviceEncoding::New;
        let real = StatBuf {
            ino: 42,
            dev: codec.encode(RawDev::from_parts(253, 5)),
            mtime: Timestamp::new(1_700_000_000, 5),
            ..StatBuf::default()
        };
        let spoofed = StatBuf {
            ino: 7,
            dev: EncodedDev::new(0),
            ..real
        };
        let table = stat_table(&real, &spoofed, &codec);
        assert!(table.contains("253:5"));
        assert!(table.contains("0:0"));
        assert!(table.contains("1700000000.000000005"));
        assert!(table.lines().nth(1).is_some_and(|l| l.contains("42") && l.contains('7')));
    }
}
