use std::time::Duration;

use tracing::{debug, info};

use crate::app::adb::client::Adb;
use crate::app::adb::paths::WINDOW_DUMP_PATH;
use crate::app::error::ProvisionError;
use crate::app::ui_xml::{contains_text, find_node_by_label};

pub struct UiAutomator<'a> {
    adb: Adb<'a>,
    trace_id: &'a str,
}

impl<'a> UiAutomator<'a> {
    pub fn new(adb: Adb<'a>, trace_id: &'a str) -> Self {
        Self { adb, trace_id }
    }

    /// Fresh accessibility dump of the current screen.
    pub fn dump(&self) -> Result<String, ProvisionError> {
        if let Err(err) = self.adb.remove_file(WINDOW_DUMP_PATH) {
            debug!(trace_id = %self.trace_id, error = %err, "stale dump not removed");
        }
        if let Err(err) = self.adb.shell_args(&["uiautomator", "dump", WINDOW_DUMP_PATH]) {
            debug!(trace_id = %self.trace_id, error = %err, "uiautomator dump reported failure");
        }
        self.adb.shell_args(&["cat", WINDOW_DUMP_PATH])
    }

    pub fn find_and_tap(&self, label: &str) -> Result<(), ProvisionError> {
        let xml = self.dump()?;
        let node = find_node_by_label(&xml, label)?.ok_or_else(|| ProvisionError::not_found(label))?;
        let (x, y) = node.bounds.center();
        info!(trace_id = %self.trace_id, label, x, y, "tapping");
        self.adb.tap(x, y)?;
        Ok(())
    }

    pub fn is_label_present(&self, text: &str) -> Result<bool, ProvisionError> {
        let xml = self.dump()?;
        Ok(contains_text(&xml, text))
    }

    /// Polls the screen for `text`; dump failures count as "not yet".
    pub fn wait_for_label(&self, text: &str, attempts: u32, delay: Duration) -> bool {
        for attempt in 1..=attempts {
            match self.is_label_present(text) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    debug!(trace_id = %self.trace_id, attempt, error = %err, "screen probe failed");
                }
            }
            if attempt < attempts {
                std::thread::sleep(delay);
            }
        }
        false
    }
}
