pub mod adb;
pub mod arch;
pub mod config;
pub mod device;
pub mod emulator;
pub mod error;
pub mod fetch;
pub mod host;
pub mod logging;
pub mod lsposed;
pub mod magisk;
pub mod models;
pub mod pipeline;
pub mod poller;
pub mod present;
pub mod sdk;
pub mod state;
pub mod steps;
pub mod toolchain;
pub mod ui_automation;
pub mod ui_xml;

#[cfg(test)]
pub(crate) mod testing;
