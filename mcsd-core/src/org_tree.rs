//! Organization Tree Builder (§4.E): index organizations, find URA-bearing
//! roots, compute transitive `partOf` membership per root.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::constants::MAX_PARTOF_DEPTH;
use crate::resource::Resource;

/// One root organization and the set of organization IDs whose `partOf`
/// chain terminates at it. The root itself is never a member of its own set.
#[derive(Debug, Clone, Default)]
pub struct OrganizationTree {
    /// root organization id -> URA value
    pub roots: HashMap<String, String>,
    /// root organization id -> member organization ids
    pub members: HashMap<String, HashSet<String>>,
    /// every organization in the input, by id, for orphan/reference checks
    pub all: HashMap<String, Value>,
}

impl OrganizationTree {
    /// Build the tree from a flat list of pulled Organization resources.
    /// Entries that are not `Organization` are ignored.
    pub fn build(organizations: &[Value]) -> Self {
        let mut all: HashMap<String, Value> = HashMap::new();
        for org in organizations {
            if Resource::resource_type(org) != Some("Organization") {
                continue;
            }
            if let Some(id) = Resource::id_of(org) {
                all.insert(id.to_string(), org.clone());
            }
        }

        let mut roots: HashMap<String, String> = HashMap::new();
        for (id, org) in &all {
            let uras = Resource::ura_identifiers(org);
            if let Some(ura) = uras.first() {
                roots.insert(id.clone(), ura.to_string());
            }
        }

        let mut members: HashMap<String, HashSet<String>> =
            roots.keys().map(|r| (r.clone(), HashSet::new())).collect();

        for id in all.keys() {
            if roots.contains_key(id) {
                continue; // a root is never its own member
            }
            if let Some(root_id) = Self::walk_to_root(id, &all, &roots) {
                members.entry(root_id).or_default().insert(id.clone());
            }
        }

        Self { roots, members, all }
    }

    /// Walk `org_id`'s `partOf` chain until it reaches a URA-bearing root,
    /// a dead end, a cycle, or the max depth. Returns the root id if found.
    fn walk_to_root(
        org_id: &str,
        all: &HashMap<String, Value>,
        roots: &HashMap<String, String>,
    ) -> Option<String> {
        let mut current = org_id.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        for _ in 0..MAX_PARTOF_DEPTH {
            if !visited.insert(current.clone()) {
                tracing::debug!(organization = %org_id, "partOf chain cycles, not linked to a root");
                return None;
            }
            let org = all.get(&current)?;
            let (part_of_type, part_of_id) = Resource::part_of_reference(org)?;
            if part_of_type != "Organization" {
                return None;
            }
            if roots.contains_key(part_of_id) {
                return Some(part_of_id.to_string());
            }
            if !all.contains_key(part_of_id) {
                return None; // dangling reference, never reaches a root
            }
            current = part_of_id.to_string();
        }
        tracing::debug!(organization = %org_id, "partOf chain exceeded max depth, not linked to a root");
        None
    }

    /// Organization IDs belonging to `root_id` (its own set), or `None` if
    /// `root_id` is not a root in this tree.
    pub fn members_of(&self, root_id: &str) -> Option<&HashSet<String>> {
        self.members.get(root_id)
    }

    pub fn is_root(&self, org_id: &str) -> bool {
        self.roots.contains_key(org_id)
    }

    /// Restrict the tree to a single root by authoritative URA, as done
    /// before validation when the source carries one (§4.F).
    pub fn filter_by_ura(&self, authoritative_ura: &str) -> OrganizationTree {
        if authoritative_ura.is_empty() {
            return self.clone();
        }
        let root_id = self
            .roots
            .iter()
            .find(|(_, ura)| ura.as_str() == authoritative_ura)
            .map(|(id, _)| id.clone());

        let Some(root_id) = root_id else {
            return OrganizationTree::default();
        };

        let mut roots = HashMap::new();
        roots.insert(root_id.clone(), authoritative_ura.to_string());
        let member_ids = self.members.get(&root_id).cloned().unwrap_or_default();
        let mut members = HashMap::new();
        members.insert(root_id.clone(), member_ids.clone());

        // Only the authoritative root and its linked members stay resolvable
        // as reference targets: other roots' organizations, and organizations
        // from this source that never linked to the authoritative root, are
        // rejected per §4.F ("other roots' data from that source is
        // rejected") and must not satisfy an orphan check either.
        let mut all = HashMap::new();
        if let Some(org) = self.all.get(&root_id) {
            all.insert(root_id.clone(), org.clone());
        }
        for member_id in &member_ids {
            if let Some(org) = self.all.get(member_id) {
                all.insert(member_id.clone(), org.clone());
            }
        }

        OrganizationTree { roots, members, all }
    }
}
