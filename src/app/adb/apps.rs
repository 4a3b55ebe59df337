/// Package ids from `pm list packages`. Accepts both `package:<id>` and
/// `package:<apk>=<id>` (`pm list packages -f`).
pub fn parse_package_ids(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|payload| match payload.rsplit_once('=') {
            Some((_, id)) => id.trim(),
            None => payload.trim(),
        })
        .filter(|id| !id.is_empty())
        .collect()
}

pub fn listing_contains_package(output: &str, package: &str) -> bool {
    parse_package_ids(output).contains(&package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_qualified_lines() {
        let output = "package:/data/app/com.example/base.apk=com.example\npackage:/system/app/Sys.apk=com.android.sys\n";
        assert_eq!(parse_package_ids(output), vec!["com.example", "com.android.sys"]);
    }

    #[test]
    fn parses_plain_package_lines() {
        let output = "package:com.android.settings\npackage:it.bicoccapp.unimib\r\n";
        assert!(listing_contains_package(output, "it.bicoccapp.unimib"));
        assert!(listing_contains_package(output, "com.android.settings"));
    }

    #[test]
    fn package_lookup_is_exact() {
        let output = "package:it.bicoccapp.unimib.beta\n";
        assert!(!listing_contains_package(output, "it.bicoccapp.unimib"));
        assert!(!listing_contains_package("", "it.bicoccapp.unimib"));
        assert!(!listing_contains_package("package:\n", ""));
    }
}
