use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchConfig {
    pub name: &'static str,
    pub abi: &'static str,
    pub system_image_id: String,
    pub hook_arch_tag: &'static str,
    /// Relative to the SDK root; rootAVD resolves it against `ANDROID_HOME`.
    pub ramdisk_path: PathBuf,
    /// Host CPU string when it was not recognized and x86_64 was assumed.
    pub unrecognized: Option<String>,
}

impl ArchConfig {
    pub fn for_host_arch(cpu: &str, api_level: &str) -> Self {
        match cpu.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Self::build("x86_64", "x86_64", "android-x86_64", api_level, None),
            "aarch64" | "arm64" => Self::build("arm64", "arm64-v8a", "android-arm64", api_level, None),
            _ => Self::build(
                "x86_64",
                "x86_64",
                "android-x86_64",
                api_level,
                Some(cpu.to_string()),
            ),
        }
    }

    fn build(
        name: &'static str,
        abi: &'static str,
        hook_arch_tag: &'static str,
        api_level: &str,
        unrecognized: Option<String>,
    ) -> Self {
        let platform = format!("android-{api_level}");
        Self {
            name,
            abi,
            system_image_id: format!("system-images;{platform};google_apis_playstore;{abi}"),
            hook_arch_tag,
            ramdisk_path: PathBuf::from("system-images")
                .join(&platform)
                .join("google_apis_playstore")
                .join(abi)
                .join("ramdisk.img"),
            unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_host_selects_x86_image() {
        let arch = ArchConfig::for_host_arch("x86_64", "33");
        assert_eq!(arch.name, "x86_64");
        assert_eq!(
            arch.system_image_id,
            "system-images;android-33;google_apis_playstore;x86_64"
        );
        assert_eq!(arch.hook_arch_tag, "android-x86_64");
        assert_eq!(
            arch.ramdisk_path,
            PathBuf::from("system-images/android-33/google_apis_playstore/x86_64/ramdisk.img")
        );
        assert!(arch.unrecognized.is_none());
    }

    #[test]
    fn aarch64_host_selects_arm64_v8a_image() {
        let arch = ArchConfig::for_host_arch("aarch64", "33");
        assert_eq!(arch.name, "arm64");
        assert_eq!(
            arch.system_image_id,
            "system-images;android-33;google_apis_playstore;arm64-v8a"
        );
        assert_eq!(arch.hook_arch_tag, "android-arm64");
    }

    #[test]
    fn unknown_arch_falls_back_to_x86_64() {
        let arch = ArchConfig::for_host_arch("riscv64", "34");
        assert_eq!(arch.name, "x86_64");
        assert_eq!(arch.unrecognized.as_deref(), Some("riscv64"));
        assert!(arch.system_image_id.contains("android-34"));
    }
}
