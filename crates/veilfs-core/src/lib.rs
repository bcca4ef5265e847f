//! # veilfs-core
//!
//! Spoof registries and the decision procedures that consult them.
//!
//! A [`VeilEngine`](engine::VeilEngine) owns one registry per observable
//! surface:
//! - **Paths and mounts**: entries hidden from lookups, directory listings
//!   and mount tables.
//! - **Stat and maps**: inode, device, timestamp and mapping metadata
//!   replaced with the values of the originals.
//! - **Fd links and uname**: link text and kernel identity rewritten.
//! - **Forced unmounts and mount ids**: mounts removed from a target's
//!   namespace and the remaining ids renumbered to close the gaps.
//!
//! Registration goes through typed methods or the JSON
//! [`transfer`] surface. Queries never fail: a miss leaves the caller's view
//! untouched.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod device;
pub mod engine;
pub mod errno;
pub mod fd_link;
pub mod host;
pub mod kstat;
pub mod logging;
pub mod maps;
pub mod mount_id;
pub mod pathname;
pub mod policy;
pub mod registry;
pub mod sus_mount;
pub mod sus_path;
pub mod transfer;
pub mod umount;
pub mod uname;
