//! The fixed admin permission set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single admin capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SeeShipments,
    ModifyTime,
    ViewTimeReports,
    ViewPayroll,
    ModifyPayroll,
    ModifyPayRates,
}

impl Permission {
    /// Every permission, in storage order.
    pub const ALL: [Permission; 6] = [
        Permission::SeeShipments,
        Permission::ModifyTime,
        Permission::ViewTimeReports,
        Permission::ViewPayroll,
        Permission::ModifyPayroll,
        Permission::ModifyPayRates,
    ];

    /// The field name used in the override map and in API responses.
    pub const fn key(self) -> &'static str {
        match self {
            Permission::SeeShipments => "see_shipments",
            Permission::ModifyTime => "modify_time",
            Permission::ViewTimeReports => "view_time_reports",
            Permission::ViewPayroll => "view_payroll",
            Permission::ModifyPayroll => "modify_payroll",
            Permission::ModifyPayRates => "modify_pay_rates",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fully populated set of admin capabilities.
///
/// There is no partial form of this type: every resolution produces all six
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionSet {
    pub see_shipments: bool,
    pub modify_time: bool,
    pub view_time_reports: bool,
    pub view_payroll: bool,
    pub modify_payroll: bool,
    pub modify_pay_rates: bool,
}

impl PermissionSet {
    /// Permissions of an admin with no override entry.
    pub const DEFAULT: PermissionSet = PermissionSet {
        see_shipments: true,
        modify_time: true,
        view_time_reports: true,
        view_payroll: true,
        modify_payroll: false,
        modify_pay_rates: false,
    };

    /// Nothing granted.
    pub const NONE: PermissionSet = PermissionSet {
        see_shipments: false,
        modify_time: false,
        view_time_reports: false,
        view_payroll: false,
        modify_payroll: false,
        modify_pay_rates: false,
    };

    /// Whether the set grants `permission`.
    pub const fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::SeeShipments => self.see_shipments,
            Permission::ModifyTime => self.modify_time,
            Permission::ViewTimeReports => self.view_time_reports,
            Permission::ViewPayroll => self.view_payroll,
            Permission::ModifyPayroll => self.modify_payroll,
            Permission::ModifyPayRates => self.modify_pay_rates,
        }
    }

    /// The granted permissions, in storage order.
    pub fn granted(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(|p| self.allows(*p))
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::DEFAULT
    }
}
