//! Permission packet wire model.
//!
//! These shapes mirror the JSON returned by the authorization server
//! (`camelCase` field names, packet type as a string).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{PacketId, UserId, UserspaceId, WorkGroupId};

/// Kind of a permission packet.
///
/// Administrative status is expressed through packet types and grants, not
/// through a separate flag on the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// Ordinary packet created by a userspace administrator.
    #[default]
    #[serde(alias = "regular")]
    Regular,
    /// System packet granting work-group manager rights.
    #[serde(alias = "manager")]
    Manager,
    /// System packet granting userspace administrator rights.
    #[serde(alias = "userspaceAdmin")]
    UserspaceAdmin,
    /// Any packet type this client does not know about yet.
    #[serde(other)]
    Unknown,
}

/// Binding of a packet to a userspace / work-group pair and its users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketOwner {
    pub packet_id: PacketId,
    pub userspace_id: UserspaceId,
    pub work_group_id: WorkGroupId,
    #[serde(default)]
    pub users: Vec<UserId>,
}

/// A bundle of named grants bound to one or more owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    pub id: PacketId,
    #[serde(rename = "type", default)]
    pub packet_type: PacketType,
    #[serde(default)]
    pub grants: BTreeSet<String>,
    #[serde(default)]
    pub owners: Vec<PacketOwner>,
}

impl Packet {
    /// Whether the packet carries at least one of `names`.
    #[must_use]
    pub fn has_any_grant(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.grants.contains(*name))
    }

    /// Whether any owner of the packet targets `work_group_id`.
    #[must_use]
    pub fn is_owned_in_work_group(&self, work_group_id: WorkGroupId) -> bool {
        self.owners
            .iter()
            .any(|owner| owner.work_group_id == work_group_id)
    }

    /// Whether any owner of the packet lives in `userspace_id`.
    #[must_use]
    pub fn is_owned_in_userspace(&self, userspace_id: UserspaceId) -> bool {
        self.owners
            .iter()
            .any(|owner| owner.userspace_id == userspace_id)
    }
}

/// Resolves "the packet that represents role X in userspace Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPacketMap {
    pub userspace_id: UserspaceId,
    pub packet_type: PacketType,
    pub packet_id: PacketId,
}
