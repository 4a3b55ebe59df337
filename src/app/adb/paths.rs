pub const WINDOW_DUMP_PATH: &str = "/sdcard/window_dump.xml";
pub const MODULE_ARCHIVE_PATH: &str = "/sdcard/LSPosed.zip";
pub const MAGISK_MODULES_DIR: &str = "/data/adb/modules";
pub const LSPD_CLI: &str = "/data/adb/lspd/bin/cli";
