//! Command sequencer.
//!
//! Writes the backend's setup commands to the shell one at a time, each after
//! its configured delay, holding the shell's automation channel for the whole
//! sequence. The dependency install (`npm i <deps>`) follows the first slot.

use std::time::Duration;

use tracing::debug;

use webly_client::{SessionContext, SetupCommands};
use webly_runner::{ShellSession, TerminalSink};

use crate::config::SetupDelays;
use crate::error::CoreResult;

/// Command that starts the dev server.
pub const DEV_SERVER_COMMAND: &str = "npx vite";

/// A command and the delay before it is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub command: String,
    pub delay: Duration,
}

/// Issues setup commands to a shell session in order.
#[derive(Debug, Clone)]
pub struct CommandSequencer {
    delays: SetupDelays,
}

impl CommandSequencer {
    pub fn new(delays: SetupDelays) -> Self {
        Self { delays }
    }

    /// Commands in issue order. Absent and blank slots are skipped.
    pub fn plan(&self, commands: &SetupCommands, context: &SessionContext) -> Vec<PlannedCommand> {
        let mut plan = Vec::new();
        for (slot, command) in commands.ordered().into_iter().enumerate() {
            if let Some(command) = command.map(str::trim).filter(|c| !c.is_empty()) {
                plan.push(PlannedCommand {
                    command: command.to_string(),
                    delay: self.delays.command(slot),
                });
            }
            if slot == 0 && context.has_dependencies() {
                plan.push(PlannedCommand {
                    command: format!("npm i {}", context.dependency_list().join(" ")),
                    delay: self.delays.dependencies(),
                });
            }
        }
        plan
    }

    /// Run the plan on `shell`. Returns the commands issued.
    pub async fn run(
        &self,
        shell: &ShellSession,
        commands: &SetupCommands,
        context: &SessionContext,
    ) -> CoreResult<Vec<String>> {
        let plan = self.plan(commands, context);
        let channel = shell.automation().await;

        if commands.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
            channel.terminal().writeln("No command received from backend.");
        }
        if !context.has_dependencies() {
            channel.terminal().writeln("No dependencies found.");
        }

        let mut issued = Vec::with_capacity(plan.len());
        for step in plan {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            channel.terminal().writeln(&format!("Executing: {}", step.command));
            channel.send_line(&step.command)?;
            debug!("Issued setup command: {}", step.command);
            issued.push(step.command);
        }
        Ok(issued)
    }

    /// Start the dev server on `shell`.
    pub async fn start_dev_server(&self, shell: &ShellSession) -> CoreResult<()> {
        let channel = shell.automation().await;
        channel.send_line(DEV_SERVER_COMMAND)?;
        Ok(())
    }

    /// Interrupt whatever runs in the foreground, then start the dev server.
    pub async fn restart_dev_server(&self, shell: &ShellSession) -> CoreResult<()> {
        let channel = shell.automation().await;
        channel.interrupt()?;
        channel.send_line(DEV_SERVER_COMMAND)?;
        Ok(())
    }
}
