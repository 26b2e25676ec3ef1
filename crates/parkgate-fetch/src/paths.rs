//! Snapshot paths and camera role selection

use std::collections::BTreeMap;

/// Main (plate) stream snapshot
pub const PLATE_SNAPSHOT_PATH: &str = "/ISAPI/Streaming/channels/1/picture";

/// Secondary (driver) stream snapshot
pub const DRIVER_SNAPSHOT_PATH: &str = "/ISAPI/Streaming/channels/2/picture";

pub const PLATE_HOST_PREFS: &[&str] = &[
    "license_plate",
    "lic",
    "lpr",
    "lp",
    "plate",
    "license_plate_out",
    "lpr_out",
];

pub const DRIVER_HOST_PREFS: &[&str] = &["driver", "dri", "drv", "face", "driver_in"];

/// Pick one camera from a role map.
///
/// Preferences are role-name prefixes tried in order (case-insensitive).
/// When none matches, the first configured role in sorted order is used.
pub fn pick_host<'a>(
    hosts: &'a BTreeMap<String, String>,
    prefs: &[&str],
) -> Option<(&'a str, &'a str)> {
    let configured = || {
        hosts
            .iter()
            .map(|(role, host)| (role.as_str(), host.trim()))
            .filter(|(_, host)| !host.is_empty())
    };

    prefs
        .iter()
        .find_map(|pref| {
            let pref = pref.to_ascii_lowercase();
            configured().find(|(role, _)| role.to_ascii_lowercase().starts_with(&pref))
        })
        .or_else(|| configured().next())
}
