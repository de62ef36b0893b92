//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use punchcard_core::{now_millis, CookieMeta, EmployeeId, SessionData, SessionUser};
use punchcard_perms::{RawFlag, RawOverride};

/// The marker the opacity property looks for in stored blobs.
pub const SECRET_MARKER: &str = "admin-secret-value";

/// Generate an employee id, numeric or textual.
pub fn employee_id() -> impl Strategy<Value = EmployeeId> {
    prop_oneof![
        (1i64..=100_000).prop_map(EmployeeId::from),
        "[a-z0-9]{1,12}".prop_map(EmployeeId::from),
    ]
}

/// Generate a logged-in user.
pub fn session_user() -> impl Strategy<Value = SessionUser> {
    (
        "[a-z0-9]{1,16}",
        proptest::option::of("[a-z][a-z0-9._]{0,15}"),
        proptest::option::of(employee_id()),
    )
        .prop_map(|(id, username, employee_id)| SessionUser {
            id,
            username,
            employee_id,
        })
}

/// Generate a JSON value without floats, so equality survives a round-trip.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::from),
        Just(Value::from(SECRET_MARKER)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate application keys stored next to the known session fields.
pub fn session_extra() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("app_[a-z]{1,8}", json_value(), 0..4)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate live session state: expiring at least an hour from now, or never.
pub fn session_data() -> impl Strategy<Value = SessionData> {
    (
        proptest::option::of(3_600_000i64..=30 * 86_400_000),
        proptest::option::of(session_user()),
        proptest::option::of("[0-9a-f]{64}"),
        session_extra(),
    )
        .prop_map(|(max_age, user, csrf_token, extra)| {
            let cookie = match max_age {
                Some(ms) => CookieMeta::with_max_age(now_millis(), ms),
                None => CookieMeta::default(),
            };
            SessionData {
                cookie,
                user,
                csrf_token,
                extra,
            }
        })
}

/// Generate session state that carries [`SECRET_MARKER`].
pub fn session_data_with_secret() -> impl Strategy<Value = SessionData> {
    session_data().prop_map(|mut data| {
        data.extra
            .insert("app_note".to_string(), Value::from(SECRET_MARKER));
        data
    })
}

/// Generate an optional encryption secret.
pub fn secret() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[ -~]{1,48}".prop_filter("blank secret", |s| !s.trim().is_empty()))
}

/// Generate a raw override value as an admin UI might store it.
pub fn raw_flag() -> impl Strategy<Value = RawFlag> {
    prop_oneof![
        any::<bool>().prop_map(RawFlag::Bool),
        Just(RawFlag::from("true")),
        Just(RawFlag::from("false")),
        Just(RawFlag::from("TRUE")),
        Just(RawFlag::from("")),
        Just(RawFlag::Other(Value::Null)),
        (0i64..=2).prop_map(|n| RawFlag::Other(Value::from(n))),
    ]
}

/// Generate a partial override.
pub fn raw_override() -> impl Strategy<Value = RawOverride> {
    let field = || proptest::option::of(raw_flag());
    (field(), field(), field(), field(), field(), field()).prop_map(
        |(see_shipments, modify_time, view_time_reports, view_payroll, modify_payroll, modify_pay_rates)| {
            RawOverride {
                see_shipments,
                modify_time,
                view_time_reports,
                view_payroll,
                modify_payroll,
                modify_pay_rates,
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use punchcard_perms::merge_override;

    proptest! {
        #[test]
        fn test_generated_sessions_are_live(data in session_data()) {
            prop_assert!(!data.cookie.is_expired(now_millis()));
        }

        #[test]
        fn test_raw_override_survives_json(raw in raw_override()) {
            let json = serde_json::to_string(&raw).unwrap();
            let back: RawOverride = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(merge_override(&back), merge_override(&raw));
        }

        #[test]
        fn test_secret_marker_present(data in session_data_with_secret()) {
            let json = serde_json::to_string(&data).unwrap();
            prop_assert!(json.contains(SECRET_MARKER));
        }
    }
}
