//! Grant evaluation.
//!
//! Every query is a pure read over whatever the [`PacketCache`] currently
//! holds for the caller. A missing principal, an unresolvable subject or an
//! empty request yields `false` / an empty list; nothing here returns an
//! error.
//!
//! Two owner-matching rules exist:
//!
//! - regular grants match an owner by **work group**,
//! - admin-panel grants (see [`Grant::AdminPanel`]) match an owner by
//!   **userspace**.
//!
//! Super users (the system user, or a userspace admin) pass every `has_*`
//! check. The `work_groups_*` queries report literal ownership and never
//! take that shortcut.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::PacketCache;
use crate::ids::{PacketId, UserspaceId, WorkGroupId};
use crate::model::{Packet, PacketType};
use crate::names::{admin_panel_grants, ADMINS_USER_ENTITIES_WRITE};
use crate::principal::{self, Identity, Principal};

#[cfg(doc)]
use crate::names::Grant;

/// Grant queries over a caller's cached packets.
///
/// Object safe; consumers hold an `Arc<dyn GrantEvaluator>` so tests can
/// substitute their own implementation.
pub trait GrantEvaluator: Send + Sync {
    /// Resolve the caller's identity.
    fn subject(&self, principal: Option<&Principal>) -> Identity {
        principal::identity_of(principal)
    }

    fn is_system_user(&self, principal: Option<&Principal>) -> bool {
        principal::is_system_user(principal)
    }

    /// Cached packets of the caller in `userspace_id`.
    fn packets(&self, principal: Option<&Principal>, userspace_id: UserspaceId) -> Arc<[Packet]>;

    fn has_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
        grant: &str,
    ) -> bool {
        self.has_any_grant(principal, userspace_id, work_group_id, &[grant])
    }

    /// Whether the caller holds at least one of `grants` in the work group.
    fn has_any_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
        grants: &[&str],
    ) -> bool;

    /// Whether the union of grants over packets owned in the work group covers `grants`.
    fn has_all_grants(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
        grants: &[&str],
    ) -> bool;

    /// Whether the caller holds a manager packet for the work group.
    fn is_work_group_manager(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
    ) -> bool;

    /// Designated admin packet holder, or holder of the blanket admin grant.
    fn is_userspace_admin(&self, principal: Option<&Principal>, userspace_id: UserspaceId) -> bool {
        self.has_userspace_admin_packet(principal, userspace_id)
            || self.has_users_entities_grant(principal, userspace_id)
    }

    fn has_users_entities_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
    ) -> bool {
        self.has_userspace_admin_panel_grant(principal, userspace_id, ADMINS_USER_ENTITIES_WRITE)
    }

    /// Whether the caller holds the userspace's designated admin packet.
    fn has_userspace_admin_packet(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
    ) -> bool;

    fn has_userspace_admin_panel_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grant: &str,
    ) -> bool {
        self.has_any_userspace_admin_panel_grant(principal, userspace_id, &[grant])
    }

    /// Admin-panel check: names outside the admin-panel namespace are ignored.
    fn has_any_userspace_admin_panel_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> bool;

    fn is_super_user(&self, principal: Option<&Principal>, userspace_id: UserspaceId) -> bool {
        self.is_system_user(principal) || self.is_userspace_admin(principal, userspace_id)
    }

    /// Packet that plays `packet_type` in `userspace_id`, from the system-packet map.
    fn system_packet_id(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        packet_type: PacketType,
    ) -> Option<PacketId>;

    fn work_groups_with_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grant: &str,
    ) -> Vec<WorkGroupId> {
        self.work_groups_with_any_grant(principal, userspace_id, &[grant])
    }

    /// Distinct work groups (first-seen order) where any of `grants` is owned.
    fn work_groups_with_any_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> Vec<WorkGroupId>;

    /// Work groups whose combined grants cover `grants`, ascending.
    fn work_groups_with_all_grants(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> Vec<WorkGroupId>;

    /// Distinct work groups across all cached packets, first-seen order.
    fn work_groups(&self, principal: Option<&Principal>, userspace_id: UserspaceId)
        -> Vec<WorkGroupId>;

    /// Distinct userspaces across every cache entry of the caller, ascending.
    fn userspaces(&self, principal: Option<&Principal>) -> Vec<UserspaceId>;
}

/// [`GrantEvaluator`] reading from a shared [`PacketCache`].
#[derive(Debug, Clone)]
pub struct CachedGrantEvaluator {
    cache: Arc<PacketCache>,
}

impl CachedGrantEvaluator {
    #[must_use]
    pub fn new(cache: Arc<PacketCache>) -> Self {
        Self { cache }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PacketCache> {
        &self.cache
    }
}

fn distinct<T: Copy + Eq + Hash>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(*item)).collect()
}

impl GrantEvaluator for CachedGrantEvaluator {
    fn packets(&self, principal: Option<&Principal>, userspace_id: UserspaceId) -> Arc<[Packet]> {
        let Some(principal) = principal else {
            return Arc::from(Vec::new());
        };
        let Identity::Known(user_id) = principal.identity() else {
            return Arc::from(Vec::new());
        };
        let key = self
            .cache
            .key(user_id, Some(userspace_id), principal.object_key());
        self.cache.get(&key)
    }

    fn has_any_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
        grants: &[&str],
    ) -> bool {
        if self.is_super_user(principal, userspace_id) {
            return true;
        }
        if principal.is_none() || grants.is_empty() {
            return false;
        }

        let admin_panel = admin_panel_grants(grants);
        if !admin_panel.is_empty()
            && self.has_any_userspace_admin_panel_grant(principal, userspace_id, &admin_panel)
        {
            return true;
        }

        self.packets(principal, userspace_id)
            .iter()
            .filter(|packet| packet.has_any_grant(grants))
            .any(|packet| packet.is_owned_in_work_group(work_group_id))
    }

    fn has_all_grants(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
        grants: &[&str],
    ) -> bool {
        if self.is_super_user(principal, userspace_id) {
            return true;
        }
        if principal.is_none() || grants.is_empty() {
            return false;
        }

        let packets = self.packets(principal, userspace_id);
        let owned: HashSet<&str> = packets
            .iter()
            .filter(|packet| packet.is_owned_in_work_group(work_group_id))
            .flat_map(|packet| packet.grants.iter().map(String::as_str))
            .collect();

        grants.iter().all(|grant| owned.contains(grant))
    }

    fn is_work_group_manager(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        work_group_id: WorkGroupId,
    ) -> bool {
        self.packets(principal, userspace_id).iter().any(|packet| {
            packet.packet_type == PacketType::Manager
                && packet.owners.iter().any(|owner| {
                    owner.work_group_id == work_group_id && owner.userspace_id == userspace_id
                })
        })
    }

    fn has_userspace_admin_packet(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
    ) -> bool {
        let Some(admin_packet) =
            self.system_packet_id(principal, userspace_id, PacketType::UserspaceAdmin)
        else {
            return false;
        };

        self.packets(principal, userspace_id)
            .iter()
            .any(|packet| packet.id == admin_packet && packet.is_owned_in_userspace(userspace_id))
    }

    fn has_any_userspace_admin_panel_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> bool {
        if principal.is_none() {
            return false;
        }
        let admin_panel = admin_panel_grants(grants);
        if admin_panel.is_empty() {
            return false;
        }

        self.packets(principal, userspace_id)
            .iter()
            .filter(|packet| packet.has_any_grant(&admin_panel))
            .any(|packet| packet.is_owned_in_userspace(userspace_id))
    }

    fn system_packet_id(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        packet_type: PacketType,
    ) -> Option<PacketId> {
        let user_id = self.subject(principal).user_id()?;
        self.cache
            .system_packet_maps(user_id)
            .iter()
            .find(|map| map.userspace_id == userspace_id && map.packet_type == packet_type)
            .map(|map| map.packet_id)
    }

    fn work_groups_with_any_grant(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> Vec<WorkGroupId> {
        if principal.is_none() || grants.is_empty() {
            return Vec::new();
        }

        let packets = self.packets(principal, userspace_id);
        distinct(
            packets
                .iter()
                .filter(|packet| packet.has_any_grant(grants))
                .flat_map(|packet| &packet.owners)
                .filter(|owner| owner.userspace_id == userspace_id)
                .map(|owner| owner.work_group_id),
        )
    }

    fn work_groups_with_all_grants(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
        grants: &[&str],
    ) -> Vec<WorkGroupId> {
        if principal.is_none() || grants.is_empty() {
            return Vec::new();
        }

        let packets = self.packets(principal, userspace_id);
        let mut by_work_group: HashMap<WorkGroupId, HashSet<&str>> = HashMap::new();
        for packet in packets.iter() {
            let work_groups: BTreeSet<WorkGroupId> = packet
                .owners
                .iter()
                .filter(|owner| owner.userspace_id == userspace_id)
                .map(|owner| owner.work_group_id)
                .collect();
            for work_group_id in work_groups {
                by_work_group
                    .entry(work_group_id)
                    .or_default()
                    .extend(packet.grants.iter().map(String::as_str));
            }
        }

        let mut covered: Vec<WorkGroupId> = by_work_group
            .into_iter()
            .filter(|(_, owned)| grants.iter().all(|grant| owned.contains(grant)))
            .map(|(work_group_id, _)| work_group_id)
            .collect();
        covered.sort_unstable();
        covered
    }

    fn work_groups(
        &self,
        principal: Option<&Principal>,
        userspace_id: UserspaceId,
    ) -> Vec<WorkGroupId> {
        let packets = self.packets(principal, userspace_id);
        distinct(
            packets
                .iter()
                .flat_map(|packet| &packet.owners)
                .map(|owner| owner.work_group_id),
        )
    }

    fn userspaces(&self, principal: Option<&Principal>) -> Vec<UserspaceId> {
        let Some(principal) = principal else {
            return Vec::new();
        };
        let Identity::Known(user_id) = principal.identity() else {
            return Vec::new();
        };

        self.cache
            .packets_for_user(user_id, principal.object_key())
            .iter()
            .flat_map(|packet| &packet.owners)
            .map(|owner| owner.userspace_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
