use std::time::Duration;

use thiserror::Error;

use crate::app::poller::WaitPhase;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Command failed: {}{}", render_command(program, args), render_exit(*exit_code))]
    Command {
        program: String,
        args: Vec<String>,
        output: String,
        exit_code: Option<i32>,
    },
    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{phase} wait timed out after {} seconds", elapsed.as_secs())]
    Timeout { phase: WaitPhase, elapsed: Duration },
    #[error("UI element '{label}' not found")]
    NotFound { label: String },
    #[error("Failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },
    #[error("{message}")]
    Config { message: String },
    #[error("{message}")]
    Io { message: String },
    #[error("{message}")]
    Dependency { message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<ProvisionError>,
    },
    #[error("Setup failed at: {step}")]
    Step {
        step: String,
        #[source]
        source: Box<ProvisionError>,
    },
}

fn render_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

fn render_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" (exit code {code})"),
        None => " (terminated by signal)".to_string(),
    }
}

impl ProvisionError {
    pub fn command(
        program: impl Into<String>,
        args: &[String],
        output: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Command {
            program: program.into(),
            args: args.to_vec(),
            output: output.into(),
            exit_code,
        }
    }

    pub fn not_found(label: impl Into<String>) -> Self {
        Self::NotFound {
            label: label.into(),
        }
    }

    pub fn parse(what: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
        }
    }

    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Command { .. } => "ERR_COMMAND",
            Self::Spawn { .. } => "ERR_SPAWN",
            Self::Timeout { .. } => "ERR_TIMEOUT",
            Self::NotFound { .. } => "ERR_NOT_FOUND",
            Self::Parse { .. } => "ERR_PARSE",
            Self::Config { .. } => "ERR_CONFIG",
            Self::Io { .. } => "ERR_IO",
            Self::Dependency { .. } => "ERR_DEPENDENCY",
            Self::Context { source, .. } | Self::Step { source, .. } => source.code(),
        }
    }

    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::Step { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }

    /// Innermost error, skipping context and step wrappers.
    pub fn root_cause(&self) -> &ProvisionError {
        match self {
            Self::Context { source, .. } | Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn chain(&self) -> Vec<String> {
        let mut messages = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            messages.push(err.to_string());
            current = err.source();
        }
        messages
    }

    pub fn command_output(&self) -> Option<&str> {
        match self.root_cause() {
            Self::Command { output, .. } if !output.trim().is_empty() => Some(output.as_str()),
            _ => None,
        }
    }
}

pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T, ProvisionError>;
}

impl<T> ResultExt<T> for Result<T, ProvisionError> {
    fn context(self, message: impl Into<String>) -> Result<T, ProvisionError> {
        self.map_err(|err| err.context(message))
    }
}
