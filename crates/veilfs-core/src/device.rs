//! Device number encoding.
//!
//! User space sees `st_dev` in a packed, platform-specific layout while the
//! engine compares device numbers in the kernel's internal
//! `major << 20 | minor` form. Registration decodes once, and the value is
//! only encoded again when it is written back into a caller's stat buffer.

use veilfs_common::types::{DeviceEncoding, EncodedDev, RawDev};

/// Converts device numbers between their encoded and raw forms.
pub trait DeviceCodec: Send + Sync {
    /// Decodes a user-visible device number.
    fn decode(&self, dev: EncodedDev) -> RawDev;

    /// Encodes a raw device number for user space.
    fn encode(&self, dev: RawDev) -> EncodedDev;
}

impl DeviceCodec for DeviceEncoding {
    fn decode(&self, dev: EncodedDev) -> RawDev {
        match self {
            Self::Huge | Self::New => new_decode(low_u32(dev.as_u64())),
            Self::Old => old_decode(low_u16(dev.as_u64())),
        }
    }

    fn encode(&self, dev: RawDev) -> EncodedDev {
        match self {
            Self::Huge | Self::New => EncodedDev::new(u64::from(new_encode(dev))),
            Self::Old => EncodedDev::new(u64::from(old_encode(dev))),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn low_u32(value: u64) -> u32 {
    (value & 0xffff_ffff) as u32
}

#[allow(clippy::cast_possible_truncation)]
const fn low_u16(value: u64) -> u16 {
    (value & 0xffff) as u16
}

/// Packs a raw device number into the 32-bit `new_encode_dev` layout.
///
/// Bits 0-7 carry the low minor byte, bits 8-19 the major number and
/// bits 20-31 the remaining minor bits.
#[must_use]
pub const fn new_encode(dev: RawDev) -> u32 {
    let major = dev.major();
    let minor = dev.minor();
    (minor & 0xff) | (major << 8) | ((minor & !0xff) << 12)
}

/// Unpacks the 32-bit `new_encode_dev` layout.
#[must_use]
pub const fn new_decode(dev: u32) -> RawDev {
    let major = (dev & 0xfff00) >> 8;
    let minor = (dev & 0xff) | ((dev >> 12) & 0xfff00);
    RawDev::from_parts(major, minor)
}

/// Packs a raw device number into the legacy 16-bit layout.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn old_encode(dev: RawDev) -> u16 {
    (((dev.major() & 0xff) << 8) | (dev.minor() & 0xff)) as u16
}

/// Unpacks the legacy 16-bit layout.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn old_decode(dev: u16) -> RawDev {
    let dev = dev as u32;
    RawDev::from_parts((dev >> 8) & 0xff, dev & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_layout_matches_makedev() {
        // glibc makedev(8, 1) == 0x801
        assert_eq!(new_decode(0x801), RawDev::from_parts(8, 1));
        assert_eq!(new_encode(RawDev::from_parts(8, 1)), 0x801);
    }

    #[test]
    fn new_layout_splits_wide_minor() {
        let dev = RawDev::from_parts(0xabc, 0x12345);
        let encoded = new_encode(dev);
        assert_eq!(encoded, 0x123a_bc45);
        assert_eq!(new_decode(encoded), dev);
    }

    #[test]
    fn huge_round_trips_sampled_values() {
        let codec = DeviceEncoding::Huge;
        for value in [0_u64, 0x801, 0xfd00, 0xfe0_0001, 0xffff_ffff, 0x1234_5678] {
            let encoded = EncodedDev::new(value);
            assert_eq!(codec.encode(codec.decode(encoded)), encoded, "value {value:#x}");
        }
    }

    #[test]
    fn huge_ignores_upper_word() {
        let codec = DeviceEncoding::Huge;
        assert_eq!(
            codec.decode(EncodedDev::new(0xdead_0000_0000_0801)),
            RawDev::from_parts(8, 1)
        );
    }

    #[test]
    fn old_round_trips() {
        let codec = DeviceEncoding::Old;
        for value in [0_u64, 0x0801, 0xfd01, 0xffff] {
            let encoded = EncodedDev::new(value);
            assert_eq!(codec.encode(codec.decode(encoded)), encoded, "value {value:#x}");
        }
        assert_eq!(codec.decode(EncodedDev::new(0x0803)), RawDev::from_parts(8, 3));
    }
}
