//! Role registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sa_core::{ChangeEvent, ChangeNotifier};

use super::{ImplementorPath, Role};
use crate::error::{SamlError, SamlResult};

/// Records which implementor performs which role; at most one per role.
///
/// Every change is broadcast as [`ChangeEvent::RolesChanged`] after the
/// registry lock is released and before the mutating call returns.
pub struct RoleRegistry {
    assignments: RwLock<BTreeMap<Role, ImplementorPath>>,
    notifier: Arc<ChangeNotifier>,
}

impl RoleRegistry {
    /// Creates an empty registry publishing to `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            assignments: RwLock::new(BTreeMap::new()),
            notifier,
        }
    }

    /// Assigns `role` to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::RoleAlreadyRegistered`] if the role already maps
    /// to a path, even the same one.
    pub fn register(&self, role: Role, path: ImplementorPath) -> SamlResult<()> {
        self.register_all(&[role], &path)
    }

    /// Assigns every role in `roles` to `path`, or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::RoleAlreadyRegistered`] for the first role that is
    /// taken; the registry is left unchanged.
    pub fn register_all(&self, roles: &[Role], path: &ImplementorPath) -> SamlResult<()> {
        {
            let mut assignments = self.assignments.write();
            if let Some((role, owner)) = roles
                .iter()
                .find_map(|role| assignments.get(role).map(|owner| (role, owner)))
            {
                return Err(SamlError::RoleAlreadyRegistered {
                    role: role.to_string(),
                    path: owner.to_string(),
                });
            }
            for role in roles {
                assignments.insert(*role, path.clone());
            }
        }

        tracing::info!(?roles, path = %path, "roles registered");
        self.notifier.publish(&ChangeEvent::RolesChanged);
        Ok(())
    }

    /// Removes every role assigned to `path` and returns them.
    pub fn unregister(&self, path: &ImplementorPath) -> Vec<Role> {
        let removed: Vec<Role> = {
            let mut assignments = self.assignments.write();
            let removed = assignments
                .iter()
                .filter(|(_, owner)| *owner == path)
                .map(|(role, _)| *role)
                .collect::<Vec<_>>();
            for role in &removed {
                assignments.remove(role);
            }
            removed
        };

        if removed.is_empty() {
            tracing::debug!(path = %path, "no roles to unregister");
        } else {
            tracing::info!(roles = ?removed, path = %path, "roles unregistered");
            self.notifier.publish(&ChangeEvent::RolesChanged);
        }
        removed
    }

    /// Refuses deletion of the implementor at `path` while it holds a role.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] naming the roles still held.
    pub fn delete_guard(&self, path: &ImplementorPath) -> SamlResult<()> {
        let held = self.roles_of(path);
        if held.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = held.iter().map(Role::as_str).collect();
        Err(SamlError::ProtectedDeletion {
            target: path.to_string(),
            reason: format!("still registered for roles: {}", names.join(", ")),
        })
    }

    /// Refuses removal of the whole authority while any role is assigned.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] listing the implementor paths
    /// that still hold roles.
    pub fn ensure_empty(&self) -> SamlResult<()> {
        let assignments = self.assignments.read();
        if assignments.is_empty() {
            return Ok(());
        }
        let mut paths: Vec<&str> = assignments.values().map(ImplementorPath::as_str).collect();
        paths.sort_unstable();
        paths.dedup();
        Err(SamlError::ProtectedDeletion {
            target: "authority".to_string(),
            reason: format!("roles are still registered at: {}", paths.join(", ")),
        })
    }

    /// Returns the implementor path for `role`.
    #[must_use]
    pub fn path_for(&self, role: Role) -> Option<ImplementorPath> {
        self.assignments.read().get(&role).cloned()
    }

    /// Returns the roles assigned to `path`.
    #[must_use]
    pub fn roles_of(&self, path: &ImplementorPath) -> Vec<Role> {
        self.assignments
            .read()
            .iter()
            .filter(|(_, owner)| *owner == path)
            .map(|(role, _)| *role)
            .collect()
    }

    /// Returns a snapshot of all assignments in role order.
    #[must_use]
    pub fn assignments(&self) -> Vec<(Role, ImplementorPath)> {
        self.assignments
            .read()
            .iter()
            .map(|(role, path)| (*role, path.clone()))
            .collect()
    }

    /// Returns whether no role is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.read().is_empty()
    }

    /// Returns the number of registered roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.read().len()
    }
}

impl fmt::Debug for RoleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleRegistry")
            .field("assignments", &*self.assignments.read())
            .finish_non_exhaustive()
    }
}
