use tracing::{debug, info};

use crate::app::adb::apps::listing_contains_package;
use crate::app::adb::client::Adb;
use crate::app::adb::parse::{has_root_identity, listing_has_emulator, parse_boot_completed};
use crate::app::config::WaitSettings;
use crate::app::error::ProvisionError;
use crate::app::poller::{wait_until, PollOutcome, WaitPhase};
use crate::app::present::Reporter;

/// Device-state waits composed from `wait_until`. Every poll tick is
/// forwarded to the reporter.
pub struct Device<'a> {
    adb: Adb<'a>,
    waits: &'a WaitSettings,
    reporter: &'a dyn Reporter,
    trace_id: &'a str,
}

impl<'a> Device<'a> {
    pub fn new(
        adb: Adb<'a>,
        waits: &'a WaitSettings,
        reporter: &'a dyn Reporter,
        trace_id: &'a str,
    ) -> Self {
        Self {
            adb,
            waits,
            reporter,
            trace_id,
        }
    }

    /// Waits until the `adb devices` listing does (`online`) or does not
    /// contain an emulator entry.
    pub fn wait_for_connectivity(&self, online: bool) -> Result<u32, ProvisionError> {
        let phase = WaitPhase::Connectivity;
        let attempts = wait_until(
            phase,
            self.waits.connectivity_timeout(),
            self.waits.poll_interval(),
            |elapsed| {
                self.reporter.waiting(phase, elapsed);
                match self.adb.devices() {
                    Ok(listing) if listing_has_emulator(&listing) == online => PollOutcome::Satisfied,
                    Ok(_) => PollOutcome::Pending,
                    Err(err) => PollOutcome::Errored(err.to_string()),
                }
            },
        )?;
        debug!(trace_id = %self.trace_id, online, attempts, "connectivity reached");
        Ok(attempts)
    }

    pub fn wait_for_boot(&self) -> Result<u32, ProvisionError> {
        if let Err(err) = self.adb.wait_for_device() {
            debug!(trace_id = %self.trace_id, error = %err, "wait-for-device failed");
        }
        let phase = WaitPhase::Boot;
        let attempts = wait_until(
            phase,
            self.waits.boot_timeout(),
            self.waits.poll_interval(),
            |elapsed| {
                self.reporter.waiting(phase, elapsed);
                match self.adb.getprop("sys.boot_completed") {
                    Ok(value) if parse_boot_completed(&value) => PollOutcome::Satisfied,
                    Ok(_) => PollOutcome::Pending,
                    Err(err) => PollOutcome::Errored(err.to_string()),
                }
            },
        )?;
        info!(trace_id = %self.trace_id, attempts, "boot completed");
        Ok(attempts)
    }

    pub fn wait_until_ready(&self) -> Result<(), ProvisionError> {
        self.wait_for_connectivity(true)?;
        self.wait_for_boot()?;
        Ok(())
    }

    /// Waits until the running system has gone down: either the emulator
    /// left the listing or it no longer reports a completed boot.
    ///
    /// A rebooting emulator usually stays listed, so the listing alone
    /// cannot tell a reboot apart from a running system.
    pub fn wait_for_shutdown(&self) -> Result<u32, ProvisionError> {
        let phase = WaitPhase::Connectivity;
        wait_until(
            phase,
            self.waits.connectivity_timeout(),
            self.waits.poll_interval(),
            |elapsed| {
                self.reporter.waiting(phase, elapsed);
                match self.adb.devices() {
                    Ok(listing) if !listing_has_emulator(&listing) => PollOutcome::Satisfied,
                    Ok(_) => match self.adb.getprop("sys.boot_completed") {
                        Ok(value) if parse_boot_completed(&value) => PollOutcome::Pending,
                        Ok(_) | Err(_) => PollOutcome::Satisfied,
                    },
                    Err(err) => PollOutcome::Errored(err.to_string()),
                }
            },
        )
    }

    /// Reboot and wait for the system to come back.
    pub fn reboot(&self) -> Result<(), ProvisionError> {
        if let Err(err) = self.adb.reboot() {
            debug!(trace_id = %self.trace_id, error = %err, "adb reboot reported failure");
        }
        self.wait_for_shutdown()?;
        self.wait_until_ready()
    }

    pub fn has_root(&self) -> bool {
        match self.adb.su("id") {
            Ok(output) => has_root_identity(&output),
            Err(err) => {
                debug!(trace_id = %self.trace_id, error = %err, "root probe failed");
                false
            }
        }
    }

    pub fn is_package_installed(&self, package: &str) -> Result<bool, ProvisionError> {
        let listing = self.adb.list_packages()?;
        Ok(listing_contains_package(&listing, package))
    }

    pub fn wait_for_package(&self, package: &str) -> Result<u32, ProvisionError> {
        let phase = WaitPhase::Package;
        wait_until(
            phase,
            self.waits.package_timeout(),
            self.waits.package_poll_interval(),
            |elapsed| {
                self.reporter.waiting(phase, elapsed);
                match self.is_package_installed(package) {
                    Ok(true) => PollOutcome::Satisfied,
                    Ok(false) => PollOutcome::Pending,
                    Err(err) => PollOutcome::Errored(err.to_string()),
                }
            },
        )
    }
}
