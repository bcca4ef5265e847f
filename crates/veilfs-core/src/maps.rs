//! Memory-mapping spoofing.
//!
//! Rules rewrite single lines of a process's mapping listing. A dynamic rule
//! follows a file by inode and swaps inode and device. A static rule picks
//! mappings with one of four [`MapsMatcher`] strategies and overwrites the
//! fields named by its [`MapsSpoof`].

use serde::{Deserialize, Serialize};
use veilfs_common::error::{Result, VeilError};
use veilfs_common::types::{Caller, EncodedDev, RawDev, VmFlags};

use crate::device::DeviceCodec;
use crate::engine::VeilEngine;
use crate::logging::veil_info;
use crate::pathname::validate_pathname;
use crate::registry::RegistryRecord;

const STORE: &str = "sus_maps";

/// Maps rule as transferred by the controller.
///
/// The flat layout mirrors the controller's record; [`MapsRequest::into_rule`]
/// turns it into a typed [`MapsRule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsRequest {
    /// Static rules use `compare_mode`; dynamic rules follow `target_ino`.
    pub is_statically: bool,
    /// Static comparison strategy, 1 to 4.
    pub compare_mode: u32,
    /// Mode 2: refuse mappings whose neighbours share the inode.
    pub is_isolated_entry: bool,
    /// Mode 4: whether the mapping is file-backed.
    pub is_file: bool,
    /// Mode 3: inode of the previous mapping, 0 for any.
    pub prev_target_ino: u64,
    /// Mode 3: inode of the next mapping, 0 for any.
    pub next_target_ino: u64,
    /// Path a dynamic rule was created for.
    pub target_pathname: String,
    /// Inode to match.
    pub target_ino: u64,
    /// Mode 4: device to match, encoded.
    pub target_dev: EncodedDev,
    /// Page offset to match.
    pub target_pgoff: u64,
    /// Protection bits to match.
    pub target_prot: VmFlags,
    /// Mode 4: address range size to match.
    pub target_addr_size: u64,
    /// Display name reported instead.
    pub spoofed_pathname: String,
    /// Inode reported instead.
    pub spoofed_ino: u64,
    /// Device reported instead, encoded.
    pub spoofed_dev: EncodedDev,
    /// Page offset reported instead.
    pub spoofed_pgoff: u64,
    /// Protection bits reported instead.
    pub spoofed_prot: VmFlags,
    /// Overwrite the display name.
    pub need_to_spoof_pathname: bool,
    /// Overwrite the inode.
    pub need_to_spoof_ino: bool,
    /// Overwrite the device.
    pub need_to_spoof_dev: bool,
    /// Overwrite the protection bits.
    pub need_to_spoof_prot: bool,
    /// Overwrite the page offset.
    pub need_to_spoof_pgoff: bool,
}

/// Neighbour inodes a mode-3 rule looks for around an anonymous mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborPattern {
    /// The previous mapping is backed by this inode.
    Prev(u64),
    /// The next mapping is backed by this inode.
    Next(u64),
    /// Both neighbours are backed by these inodes.
    Both {
        /// Inode of the previous mapping.
        prev: u64,
        /// Inode of the next mapping.
        next: u64,
    },
}

/// How a static rule selects mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapsMatcher {
    /// Mode 1: inode equality.
    Inode {
        /// Inode to match.
        target_ino: u64,
    },
    /// Mode 2: inode, protection bits and page offset, refined by the
    /// neighbouring mappings.
    InodeProt {
        /// Inode to match.
        target_ino: u64,
        /// Protection bits to match.
        prot: VmFlags,
        /// Page offset to match.
        pgoff: u64,
        /// Match only when no neighbour maps the same inode.
        isolated: bool,
    },
    /// Mode 3: an anonymous mapping identified by its file-backed neighbours.
    Neighbors(NeighborPattern),
    /// Mode 4: the mapping's shape, whatever its inode.
    Layout {
        /// Whether the mapping is file-backed.
        is_file: bool,
        /// Device to match.
        dev: RawDev,
        /// Page offset to match.
        pgoff: u64,
        /// Protection bits to match.
        prot: VmFlags,
        /// Size of the address range.
        addr_size: u64,
    },
}

/// Fields a static rule overwrites; `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapsSpoof {
    /// Display name.
    pub pathname: Option<String>,
    /// Inode.
    pub ino: Option<u64>,
    /// Device.
    pub dev: Option<RawDev>,
    /// Protection bits; other flag bits are kept.
    pub prot: Option<VmFlags>,
    /// Page offset.
    pub pgoff: Option<u64>,
}

/// Stored maps rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapsRule {
    /// Follows a file by inode and swaps its inode and device.
    Dynamic {
        /// Path the rule was created for, key for updates.
        target_pathname: Option<String>,
        /// Inode currently associated with the path.
        target_ino: u64,
        /// Inode reported instead.
        spoofed_ino: u64,
        /// Device reported instead.
        spoofed_dev: RawDev,
    },
    /// Fixed comparison strategy and spoof set.
    Static {
        /// Selection strategy.
        matcher: MapsMatcher,
        /// Fields to overwrite.
        spoof: MapsSpoof,
    },
}

/// A neighbouring mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Backing inode, `None` for anonymous mappings.
    pub ino: Option<u64>,
}

impl Neighbor {
    /// A file-backed neighbour.
    #[must_use]
    pub const fn file(ino: u64) -> Self {
        Self { ino: Some(ino) }
    }

    /// An anonymous neighbour.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { ino: None }
    }
}

/// Read-only facts about the mapping being rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingQuery {
    /// Backing inode, 0 for anonymous mappings.
    pub ino: u64,
    /// Whether the mapping is file-backed.
    pub is_file: bool,
    /// Size of the address range.
    pub addr_size: u64,
    /// Previous mapping in the address space.
    pub prev: Option<Neighbor>,
    /// Next mapping in the address space.
    pub next: Option<Neighbor>,
}

impl MappingQuery {
    fn neighbor_inodes(&self) -> impl Iterator<Item = u64> {
        [self.prev, self.next]
            .into_iter()
            .filter_map(|n| n.and_then(|n| n.ino))
    }
}

/// Fields of the rendered mapping a rule may overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingView {
    /// Reported inode.
    pub ino: u64,
    /// Reported device.
    pub dev: RawDev,
    /// Reported vm flags.
    pub flags: VmFlags,
    /// Reported page offset.
    pub pgoff: u64,
    /// Display name; `None` keeps the kernel's own.
    pub name: Option<String>,
}

/// Outcome of [`VeilEngine::spoof_maps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MapsVerdict {
    /// No rule matched.
    Unchanged = 0,
    /// A dynamic rule swapped inode and device.
    Simple = 1,
    /// A static rule applied its spoof set.
    Rule = 2,
}

impl From<MapsVerdict> for i32 {
    fn from(verdict: MapsVerdict) -> Self {
        verdict as Self
    }
}

fn transfer_fault(message: impl Into<String>) -> VeilError {
    VeilError::TransferFault {
        store: STORE,
        message: message.into(),
    }
}

impl MapsRequest {
    /// Validates the request and decodes its device numbers with `codec`.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for an unknown compare mode, a mode 1 or 2
    /// rule without inode, a mode 3 rule without neighbours, or an unusable
    /// path.
    pub fn into_rule(self, codec: &dyn DeviceCodec) -> Result<MapsRule> {
        if !self.target_pathname.is_empty() {
            validate_pathname(STORE, "target_pathname", &self.target_pathname)?;
        }
        if !self.is_statically {
            if self.target_ino == 0 && self.target_pathname.is_empty() {
                return Err(transfer_fault(
                    "dynamic rule needs a target_ino or a target_pathname",
                ));
            }
            return Ok(MapsRule::Dynamic {
                target_pathname: (!self.target_pathname.is_empty())
                    .then_some(self.target_pathname),
                target_ino: self.target_ino,
                spoofed_ino: self.spoofed_ino,
                spoofed_dev: codec.decode(self.spoofed_dev),
            });
        }

        let matcher = match self.compare_mode {
            1 | 2 if self.target_ino == 0 => {
                return Err(transfer_fault(format!(
                    "compare_mode {} needs a non-zero target_ino",
                    self.compare_mode
                )));
            }
            1 => MapsMatcher::Inode {
                target_ino: self.target_ino,
            },
            2 => MapsMatcher::InodeProt {
                target_ino: self.target_ino,
                prot: self.target_prot,
                pgoff: self.target_pgoff,
                isolated: self.is_isolated_entry,
            },
            3 => MapsMatcher::Neighbors(
                match (self.prev_target_ino, self.next_target_ino) {
                    (0, 0) => {
                        return Err(transfer_fault(
                            "compare_mode 3 needs a prev_target_ino or a next_target_ino",
                        ));
                    }
                    (prev, 0) => NeighborPattern::Prev(prev),
                    (0, next) => NeighborPattern::Next(next),
                    (prev, next) => NeighborPattern::Both { prev, next },
                },
            ),
            4 => MapsMatcher::Layout {
                is_file: self.is_file,
                dev: codec.decode(self.target_dev),
                pgoff: self.target_pgoff,
                prot: self.target_prot,
                addr_size: self.target_addr_size,
            },
            other => return Err(transfer_fault(format!("unknown compare_mode {other}"))),
        };

        if self.need_to_spoof_pathname {
            validate_pathname(STORE, "spoofed_pathname", &self.spoofed_pathname)?;
        }
        let spoof = MapsSpoof {
            pathname: self.need_to_spoof_pathname.then_some(self.spoofed_pathname),
            ino: self.need_to_spoof_ino.then_some(self.spoofed_ino),
            dev: self
                .need_to_spoof_dev
                .then(|| codec.decode(self.spoofed_dev)),
            prot: self.need_to_spoof_prot.then_some(self.spoofed_prot),
            pgoff: self.need_to_spoof_pgoff.then_some(self.spoofed_pgoff),
        };
        Ok(MapsRule::Static { matcher, spoof })
    }
}

impl MapsMatcher {
    /// Returns whether two matchers would select the same mappings.
    fn same_key(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Inode { target_ino: a }, Self::Inode { target_ino: b }) => a == b,
            (
                Self::InodeProt {
                    target_ino: a_ino,
                    prot: a_prot,
                    pgoff: a_pgoff,
                    isolated: a_isolated,
                },
                Self::InodeProt {
                    target_ino: b_ino,
                    prot: b_prot,
                    pgoff: b_pgoff,
                    isolated: b_isolated,
                },
            ) => {
                a_ino == b_ino
                    && a_isolated == b_isolated
                    && a_pgoff == b_pgoff
                    && a_prot.same_prot(*b_prot)
            }
            (Self::Neighbors(a), Self::Neighbors(b)) => a == b,
            (
                Self::Layout {
                    is_file: a_file,
                    dev: a_dev,
                    pgoff: a_pgoff,
                    prot: a_prot,
                    addr_size: a_size,
                },
                Self::Layout {
                    is_file: b_file,
                    dev: b_dev,
                    pgoff: b_pgoff,
                    prot: b_prot,
                    addr_size: b_size,
                },
            ) => {
                a_file == b_file
                    && a_dev == b_dev
                    && a_pgoff == b_pgoff
                    && a_size == b_size
                    && a_prot.same_prot(*b_prot)
            }
            _ => false,
        }
    }

    fn matches(&self, query: &MappingQuery, view: &MappingView) -> bool {
        match *self {
            Self::Inode { target_ino } => query.ino != 0 && query.ino == target_ino,
            Self::InodeProt {
                target_ino,
                prot,
                pgoff,
                isolated,
            } => {
                if query.ino == 0
                    || query.ino != target_ino
                    || !prot.same_prot(view.flags)
                    || pgoff != view.pgoff
                {
                    return false;
                }
                if isolated {
                    !query.neighbor_inodes().any(|ino| ino == target_ino)
                } else {
                    query
                        .neighbor_inodes()
                        .any(|ino| ino.abs_diff(target_ino) <= 1)
                }
            }
            Self::Neighbors(pattern) => {
                if query.is_file {
                    return false;
                }
                let prev = query.prev.and_then(|n| n.ino);
                let next = query.next.and_then(|n| n.ino);
                match pattern {
                    NeighborPattern::Prev(p) => prev == Some(p),
                    NeighborPattern::Next(n) => next == Some(n),
                    NeighborPattern::Both { prev: p, next: n } => {
                        prev == Some(p) && next == Some(n)
                    }
                }
            }
            Self::Layout {
                is_file,
                dev,
                pgoff,
                prot,
                addr_size,
            } => {
                is_file == query.is_file
                    && dev == view.dev
                    && pgoff == view.pgoff
                    && prot.same_prot(view.flags)
                    && addr_size == query.addr_size
            }
        }
    }

    const fn mode(&self) -> u32 {
        match self {
            Self::Inode { .. } => 1,
            Self::InodeProt { .. } => 2,
            Self::Neighbors(_) => 3,
            Self::Layout { .. } => 4,
        }
    }
}

impl MapsSpoof {
    fn apply(&self, view: &mut MappingView) {
        if let Some(name) = &self.pathname {
            view.name = Some(name.clone());
        }
        if let Some(ino) = self.ino {
            view.ino = ino;
        }
        if let Some(dev) = self.dev {
            view.dev = dev;
        }
        if let Some(prot) = self.prot {
            view.flags = view.flags.with_prot_of(prot);
        }
        if let Some(pgoff) = self.pgoff {
            view.pgoff = pgoff;
        }
    }
}

impl RegistryRecord for MapsRule {
    const STORE: &'static str = STORE;

    fn conflicts_with(&self, candidate: &Self) -> bool {
        match (self, candidate) {
            (
                Self::Dynamic {
                    target_pathname: a_path,
                    target_ino: a_ino,
                    ..
                },
                Self::Dynamic {
                    target_pathname: b_path,
                    target_ino: b_ino,
                    ..
                },
            ) => {
                if *b_ino != 0 {
                    a_ino == b_ino
                } else {
                    b_path.is_some() && a_path == b_path
                }
            }
            (Self::Static { matcher: a, .. }, Self::Static { matcher: b, .. }) => a.same_key(b),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Dynamic {
                target_pathname,
                target_ino,
                ..
            } => format!(
                "dynamic target_ino '{target_ino}' target_pathname '{}'",
                target_pathname.as_deref().unwrap_or_default()
            ),
            Self::Static { matcher, .. } => {
                format!("static compare_mode '{}' {matcher:?}", matcher.mode())
            }
        }
    }
}

impl VeilEngine {
    /// Registers a maps rule, decoding its device numbers.
    ///
    /// # Errors
    ///
    /// Returns `TransferFault` for an invalid request and `DuplicateEntry`
    /// when a rule with the same mode-dependent key exists.
    pub fn add_sus_maps(&self, request: MapsRequest) -> Result<()> {
        let rule = request
            .into_rule(self.codec.as_ref())
            .map_err(|e| self.rejected(e))?;
        self.register(&self.maps, rule)
    }

    /// Re-associates the dynamic rule created for `request.target_pathname`
    /// with `request.target_ino`. Static rules are never updated.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no dynamic rule carries that path.
    pub fn update_sus_maps(&self, request: &MapsRequest) -> Result<()> {
        let path = request.target_pathname.as_str();
        let new_ino = request.target_ino;
        let mut old_ino = 0;
        self.maps
            .update(
                path,
                |rule| {
                    matches!(
                        rule,
                        MapsRule::Dynamic { target_pathname: Some(p), .. } if p == path
                    )
                },
                |rule| {
                    if let MapsRule::Dynamic { target_ino, .. } = rule {
                        old_ino = *target_ino;
                        *target_ino = new_ino;
                    }
                },
            )
            .map_err(|e| self.rejected(e))?;
        veil_info!(
            self.log,
            target_pathname = path,
            old_ino,
            new_ino,
            "maps target inode updated"
        );
        Ok(())
    }

    /// Applies the first matching rule to `view`.
    ///
    /// The identity gate only applies when `gate_maps` is set.
    pub fn spoof_maps(
        &self,
        caller: &Caller,
        query: &MappingQuery,
        view: &mut MappingView,
    ) -> MapsVerdict {
        if self.config.gate_maps && !self.is_target(caller) {
            return MapsVerdict::Unchanged;
        }
        self.maps
            .scan(|rule| match rule {
                MapsRule::Dynamic {
                    target_ino,
                    spoofed_ino,
                    spoofed_dev,
                    ..
                } => (query.ino != 0 && query.ino == *target_ino).then(|| {
                    view.ino = *spoofed_ino;
                    view.dev = *spoofed_dev;
                    veil_info!(self.log, rule = %rule.describe(), "spoofing maps");
                    MapsVerdict::Simple
                }),
                MapsRule::Static { matcher, spoof } => {
                    matcher.matches(query, view).then(|| {
                        spoof.apply(view);
                        veil_info!(self.log, rule = %rule.describe(), "spoofing maps");
                        MapsVerdict::Rule
                    })
                }
            })
            .unwrap_or(MapsVerdict::Unchanged)
    }
}
