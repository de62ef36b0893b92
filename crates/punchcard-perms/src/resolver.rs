//! Access policy resolution.
//!
//! Permissions are recomputed from the stored override map on every call.
//! Nothing is cached across requests, so an admin edit takes effect on the
//! very next request.

use std::sync::Arc;

use tracing::debug;

use punchcard_core::EmployeeId;
use punchcard_store::SettingsStore;

use crate::error::Result;
use crate::overrides::{OverrideMap, RawOverride};
use crate::permissions::PermissionSet;

/// Settings key holding the override map.
pub const ACCESS_ADMINS_KEY: &str = "access_admins";

/// Resolves an employee id into a full [`PermissionSet`].
pub struct AccessPolicyResolver<S: SettingsStore + ?Sized> {
    settings: Arc<S>,
}

impl<S: SettingsStore + ?Sized> Clone for AccessPolicyResolver<S> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
        }
    }
}

impl<S: SettingsStore + ?Sized> AccessPolicyResolver<S> {
    /// Create a resolver over a settings store.
    pub fn new(settings: Arc<S>) -> Self {
        Self { settings }
    }

    /// Load the override map.
    ///
    /// A missing, malformed, or non-object blob yields an empty map. Only a
    /// storage failure is an error.
    pub async fn load_access_admin_map(&self) -> Result<OverrideMap> {
        let blob = self.settings.get_setting(ACCESS_ADMINS_KEY).await?;
        Ok(blob.as_deref().map(OverrideMap::parse).unwrap_or_default())
    }

    /// Resolve an employee's admin permissions.
    pub async fn admin_access_perms(&self, employee_id: &EmployeeId) -> Result<PermissionSet> {
        let map = self.load_access_admin_map().await?;
        let perms = map.resolve(employee_id);
        debug!(%employee_id, ?perms, "resolved admin permissions");
        Ok(perms)
    }

    /// Write an employee's override entry.
    ///
    /// This is a read-modify-write of the whole map with no locking; two
    /// concurrent edits race and the later one wins.
    pub async fn set_employee_override(
        &self,
        employee_id: &EmployeeId,
        raw: &RawOverride,
    ) -> Result<()> {
        let mut map = self.load_access_admin_map().await?;
        map.insert(employee_id, raw);
        self.settings
            .put_setting(ACCESS_ADMINS_KEY, &map.to_json())
            .await?;
        Ok(())
    }

    /// Remove an employee's override entry, restoring the defaults.
    ///
    /// Returns whether an entry existed.
    pub async fn remove_employee_override(&self, employee_id: &EmployeeId) -> Result<bool> {
        let mut map = self.load_access_admin_map().await?;
        if !map.remove(employee_id) {
            return Ok(false);
        }
        self.settings
            .put_setting(ACCESS_ADMINS_KEY, &map.to_json())
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchcard_store::MemoryStore;

    async fn resolver_with(blob: Option<&str>) -> AccessPolicyResolver<MemoryStore> {
        let store = MemoryStore::default();
        if let Some(blob) = blob {
            store.put_setting(ACCESS_ADMINS_KEY, blob).await.unwrap();
        }
        AccessPolicyResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_no_setting_gives_defaults() {
        let resolver = resolver_with(None).await;
        assert!(resolver.load_access_admin_map().await.unwrap().is_empty());
        assert_eq!(
            resolver.admin_access_perms(&EmployeeId::from(1)).await.unwrap(),
            PermissionSet::DEFAULT
        );
    }

    #[tokio::test]
    async fn test_malformed_setting_gives_defaults() {
        let resolver = resolver_with(Some("{{{")).await;
        assert_eq!(
            resolver.admin_access_perms(&EmployeeId::from(1)).await.unwrap(),
            PermissionSet::DEFAULT
        );
    }

    #[tokio::test]
    async fn test_scenario_42() {
        let resolver = resolver_with(Some(r#"{"42": {"view_payroll": true}}"#)).await;
        let perms = resolver.admin_access_perms(&EmployeeId::from(42)).await.unwrap();
        assert!(perms.view_payroll);
        assert!(perms.modify_payroll);
    }

    #[tokio::test]
    async fn test_string_and_int_ids_resolve_alike() {
        let resolver = resolver_with(Some(r#"{"42": {"view_payroll": false}}"#)).await;
        let by_int = resolver.admin_access_perms(&EmployeeId::from(42)).await.unwrap();
        let by_str = resolver.admin_access_perms(&EmployeeId::from("42")).await.unwrap();
        assert_eq!(by_int, by_str);
        assert!(!by_int.view_payroll);
    }

    #[tokio::test]
    async fn test_set_and_remove_override() {
        let resolver = resolver_with(Some(r#"{"1": {"modify_time": true}}"#)).await;
        let id = EmployeeId::from(2);

        let raw = RawOverride {
            view_payroll: Some(true.into()),
            modify_pay_rates: Some("true".into()),
            ..RawOverride::default()
        };
        resolver.set_employee_override(&id, &raw).await.unwrap();

        let perms = resolver.admin_access_perms(&id).await.unwrap();
        assert!(perms.view_payroll);
        assert!(perms.modify_payroll);
        assert!(perms.modify_pay_rates);
        assert!(!perms.see_shipments);

        // The other entry survives the rewrite.
        let other = resolver.admin_access_perms(&EmployeeId::from(1)).await.unwrap();
        assert!(other.modify_time);

        assert!(resolver.remove_employee_override(&id).await.unwrap());
        assert!(!resolver.remove_employee_override(&id).await.unwrap());
        assert_eq!(
            resolver.admin_access_perms(&id).await.unwrap(),
            PermissionSet::DEFAULT
        );
    }

    #[tokio::test]
    async fn test_changes_visible_without_restart() {
        let store = Arc::new(MemoryStore::default());
        let resolver = AccessPolicyResolver::new(store.clone());
        let id = EmployeeId::from(9);

        assert!(resolver.admin_access_perms(&id).await.unwrap().view_payroll);
        store
            .put_setting(ACCESS_ADMINS_KEY, r#"{"9": {}}"#)
            .await
            .unwrap();
        assert!(!resolver.admin_access_perms(&id).await.unwrap().view_payroll);
    }
}
