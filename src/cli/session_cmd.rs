//! Session and drain commands
//!
//! These are driven by agent hooks, so they speak JSON regardless of the
//! output format and never fail noisily on bad hook input.

use std::io;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::output::{print_json, Output};
use crate::session::{
    DrainCoordinator, DrainRelease, HookInput, HookResponse, SessionError, StopDecision,
};
use crate::storage::{Project, TaskStore};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Claim the session for the hook caller (reads session_id from stdin)
    Claim,

    /// Release the session if the caller owns it (reads session_id from stdin)
    Release,

    /// Remove a stale session file regardless of owner
    Prune,

    /// Stop hook: keep a draining owner working until all tasks are closed
    Hook,
}

#[derive(Subcommand)]
pub enum DrainCommands {
    /// Activate drain mode
    Claim,

    /// Deactivate drain mode once every task is closed
    Release,
}

#[derive(Serialize)]
struct ClaimResponse {
    claimed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    owner: String,
}

#[derive(Serialize)]
struct ReleaseResponse {
    released: bool,
}

#[derive(Serialize)]
struct DrainResponse {
    success: bool,
    drain_active: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    message: String,
}

impl DrainResponse {
    fn new(success: bool, drain_active: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            drain_active,
            message: message.into(),
        }
    }
}

fn refused_message(active: usize, open: usize) -> String {
    format!(
        "You attempted to release drain mode but there are still {} active and {} open tasks remaining.\n\n\
         It looks like you may have forgotten about pending work or misunderstood when drain mode should end.\n\n\
         Please:\n\
         1. Re-read your instructions for the current workflow\n\
         2. Run 'bits ready' to see what tasks are available\n\
         3. Continue working until all tasks are complete\n\n\
         Drain mode should only be released when ALL tasks are finished, not when you want to pause or ask the user a question.",
        active, open
    )
}

fn read_hook_input(output: &Output) -> Option<HookInput> {
    match HookInput::from_reader(io::stdin().lock()) {
        Ok(input) => {
            output.verbose_ctx(
                "session",
                &format!("Hook input: session {} ({})", input.session_id, input.source),
            );
            Some(input)
        }
        Err(e) => {
            output.verbose_ctx("session", &format!("Ignoring hook input: {}", e));
            None
        }
    }
}

fn drain_coordinator(project: &Project) -> DrainCoordinator<TaskStore> {
    DrainCoordinator::new(project.session_store(), project.lifecycle())
}

pub fn run_session(
    command: SessionCommands,
    output: &Output,
    open: &dyn Fn() -> Result<Project>,
) -> Result<()> {
    match command {
        SessionCommands::Claim => {
            let Some(input) = read_hook_input(output) else {
                return Ok(());
            };

            let project = open()?;
            let claim = project
                .session_store()
                .claim(&input.session_id, &input.source)?;
            output.verbose_ctx("session", &format!("Claim result: {:?}", claim));

            print_json(&ClaimResponse {
                claimed: claim.is_granted(),
                owner: claim.owner().to_string(),
            });
        }

        SessionCommands::Release => {
            let Some(input) = read_hook_input(output) else {
                return Ok(());
            };

            let released = match open().and_then(|p| p.session_store().release(&input.session_id))
            {
                Ok(released) => released,
                Err(e) => {
                    output.verbose_ctx("session", &format!("Release skipped: {:#}", e));
                    return Ok(());
                }
            };

            print_json(&ReleaseResponse { released });
        }

        SessionCommands::Prune => {
            let project = open()?;
            if project.session_store().delete()? {
                output.success("Session file pruned");
            } else {
                output.success("No session file to prune");
            }
        }

        SessionCommands::Hook => hook(output, open),
    }

    Ok(())
}

/// Runs the stop hook
///
/// Prints a block response when the caller must keep working. Every failure
/// (bad input, missing store, unreadable files) allows the stop.
pub fn hook(output: &Output, open: &dyn Fn() -> Result<Project>) {
    let Some(input) = read_hook_input(output) else {
        return;
    };

    let decision = open()
        .and_then(|project| drain_coordinator(&project).check_termination(&input.session_id));

    let decision = match decision {
        Ok(decision) => decision,
        Err(e) => {
            output.verbose_ctx("hook", &format!("Allowing stop after error: {:#}", e));
            StopDecision::Allow
        }
    };
    output.verbose_ctx("hook", &format!("Decision: {:?}", decision));

    if let Some(response) = HookResponse::for_decision(&decision) {
        print_json(&response);
    }
}

pub fn run_drain(
    command: DrainCommands,
    output: &Output,
    open: &dyn Fn() -> Result<Project>,
) -> Result<()> {
    let project = open()?;
    let drain = drain_coordinator(&project);

    match command {
        DrainCommands::Claim => match drain.activate() {
            Ok(()) => print_json(&DrainResponse::new(true, true, "Drain mode activated")),
            Err(e) if e.downcast_ref::<SessionError>().is_some() => {
                print_json(&DrainResponse::new(false, false, e.to_string()));
                std::process::exit(1);
            }
            Err(e) => return Err(e),
        },

        DrainCommands::Release => match drain.release() {
            Ok(DrainRelease::Released) => {
                print_json(&DrainResponse::new(true, false, "Drain mode deactivated"))
            }
            Ok(DrainRelease::Refused { active, open }) => {
                output.verbose_ctx(
                    "drain",
                    &format!("Refusing release: {} active, {} open", active, open),
                );
                print_json(&DrainResponse::new(
                    false,
                    true,
                    refused_message(active, open),
                ));
                std::process::exit(1);
            }
            Err(e) if e.downcast_ref::<SessionError>().is_some() => {
                print_json(&DrainResponse::new(false, false, "No session file exists"));
            }
            Err(e) => return Err(e),
        },
    }

    Ok(())
}
