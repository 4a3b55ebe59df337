use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::app::models::{DeviceSummary, LspdModule};

/// Skips the daemon banner and header; extra `key:value` tokens other than
/// `model:` are ignored.
pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .filter(|line| !line.to_lowercase().starts_with("list of devices"))
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let serial = tokens.next()?.to_string();
            let state = tokens.next()?.to_string();
            let model = tokens
                .find_map(|token| token.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceSummary {
                serial,
                state,
                model,
            })
        })
        .collect()
}

pub fn listing_has_emulator(output: &str) -> bool {
    parse_adb_devices(output)
        .iter()
        .any(|summary| summary.serial.contains("emulator"))
}

pub fn parse_boot_completed(output: &str) -> bool {
    output.trim() == "1"
}

pub fn has_root_identity(output: &str) -> bool {
    output.to_lowercase().contains("uid=0")
}

static ZYGISK_VALUE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bvalue=(\d+)").ok());

pub fn parse_zygisk_enabled(output: &str) -> bool {
    let Some(re) = ZYGISK_VALUE.as_ref() else {
        return false;
    };
    re.captures_iter(output).any(|caps| &caps[1] == "1")
}

pub fn parse_avd_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        // The emulator binary prints diagnostics like "INFO    | ..." on the same stream.
        .filter(|line| !line.contains(" | "))
        .map(str::to_string)
        .collect()
}

pub fn sdk_component_installed(list_installed_output: &str, component: &str) -> bool {
    list_installed_output.lines().any(|line| {
        line.split('|')
            .next()
            .map(str::trim)
            .is_some_and(|path| path == component)
    })
}

/// Parses `cli modules ls`: a header line, then `<package> <uid> <state>` rows.
pub fn parse_lspd_modules(output: &str) -> BTreeMap<String, LspdModule> {
    let mut modules = BTreeMap::new();
    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            continue;
        }
        modules.insert(
            fields[0].to_string(),
            LspdModule {
                package: fields[0].to_string(),
                enabled: fields[2] == "enabled",
            },
        );
    }
    modules
}

pub fn scope_contains(scope_output: &str, package: &str) -> bool {
    scope_output.lines().any(|line| {
        let entry = line.trim();
        entry == package
            || entry
                .split(['/', ' ', '\t'])
                .next()
                .is_some_and(|head| head == package)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_listing() {
        let output = "List of devices attached\nemulator-5554\tdevice product:sdk_gphone64 model:Pixel_7_Pro transport_id:1\n";
        let devices = parse_adb_devices(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].state, "device");
        assert_eq!(devices[0].model.as_deref(), Some("Pixel_7_Pro"));
        assert!(listing_has_emulator(output));
    }

    #[test]
    fn empty_listing_has_no_emulator() {
        assert!(!listing_has_emulator("List of devices attached\n\n"));
        assert!(!listing_has_emulator(
            "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\n"
        ));
        assert!(!listing_has_emulator("List of devices attached\nR58M12ABC\tdevice\n"));
    }

    #[test]
    fn boot_completed_requires_exact_one() {
        assert!(parse_boot_completed("1\n"));
        assert!(parse_boot_completed("  1\r\n"));
        assert!(!parse_boot_completed(""));
        assert!(!parse_boot_completed("0"));
        assert!(!parse_boot_completed("10"));
    }

    #[test]
    fn detects_root_identity() {
        assert!(has_root_identity("uid=0(root) gid=0(root) groups=0(root) context=u:r:magisk:s0"));
        assert!(!has_root_identity("/system/bin/sh: su: inaccessible or not found"));
        assert!(!has_root_identity("uid=2000(shell) gid=2000(shell)"));
    }

    #[test]
    fn zygisk_flag_requires_value_one() {
        assert!(parse_zygisk_enabled("value=1\n"));
        assert!(!parse_zygisk_enabled("value=0\n"));
        assert!(!parse_zygisk_enabled("value=10\n"));
        assert!(!parse_zygisk_enabled(""));
    }

    #[test]
    fn avd_list_skips_emulator_diagnostics() {
        let output = "INFO    | Storing crashdata in: /tmp/android/emu-crash.db\nPixel_7_Pro_API_33\n\nMedium_Phone\n";
        assert_eq!(parse_avd_list(output), vec!["Pixel_7_Pro_API_33", "Medium_Phone"]);
    }

    #[test]
    fn sdk_component_match_is_by_path_column() {
        let output = "Installed packages:\n  Path                 | Version | Description\n  -------              | ------- | -------\n  emulator             | 34.1.19 | Android Emulator\n  platform-tools       | 35.0.1  | Android SDK Platform-Tools\n  system-images;android-33;google_apis_playstore;x86_64 | 9 | Google Play Intel x86_64 Atom System Image\n";
        assert!(sdk_component_installed(output, "emulator"));
        assert!(sdk_component_installed(output, "platform-tools"));
        assert!(sdk_component_installed(
            output,
            "system-images;android-33;google_apis_playstore;x86_64"
        ));
        assert!(!sdk_component_installed(
            output,
            "system-images;android-33;google_apis_playstore;arm64-v8a"
        ));
    }

    #[test]
    fn parses_lspd_module_table() {
        let output = "PACKAGE                      UID     STATUS\nit.attendance100.bicoccapp   10190   disabled\ncom.example.other           10191   enabled\nbroken line\n";
        let modules = parse_lspd_modules(output);
        assert_eq!(modules.len(), 2);
        assert!(!modules["it.attendance100.bicoccapp"].enabled);
        assert!(modules["com.example.other"].enabled);
    }

    #[test]
    fn scope_lookup_matches_package_entries() {
        let output = "it.bicoccapp.unimib/0\nandroid/0\n";
        assert!(scope_contains(output, "it.bicoccapp.unimib"));
        assert!(!scope_contains(output, "it.bicoccapp"));
        assert!(!scope_contains("", "it.bicoccapp.unimib"));
    }
}
