//! The execution engine.
//!
//! A run walks a plan of command indices with an instruction pointer. Block
//! commands (`For`/`EndFor`, `If`/`EndIf`) manipulate an explicit frame
//! stack and move the pointer; every other command is expanded, validated
//! and run in place. Problems local to one command only change that
//! command's status. Structural problems are engine faults and abort the
//! run.

use std::fmt::{Display, Formatter};

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::command::{CommandContext, CommandKind, RunFlags};
use crate::command_definitions::ControlRole;
use crate::commands::control::{evaluate_if, loop_values};
use crate::interpolation::interpolate_parameters;
use crate::parameter::{validate_parameters, ParameterSet, Value};
use crate::processor::{Processor, RunState};
use crate::status::{CommandPhase, Status};

/// Structural problems that make the rest of a run meaningless.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    #[error("{command}(Name=\"{name}\") at line {line} has no matching {terminator}")]
    MissingTerminator {
        command: String,
        terminator: String,
        name: String,
        line: usize,
    },

    #[error("{command}(Name=\"{name}\") at line {line} closes a block while `{open}` is still open inside it")]
    ImproperNesting {
        command: String,
        name: String,
        open: String,
        line: usize,
    },

    #[error("{command}(Name=\"{name}\") at line {line} is nested inside a block with the same name")]
    DuplicateBlockName {
        command: String,
        name: String,
        line: usize,
    },

    #[error("Loops iterated more than {limit} times")]
    IterationLimit { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    Fault(EngineFault),
}

impl Display for AbortReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Cancelled => f.write_str("run cancelled"),
            AbortReason::Fault(fault) => write!(f, "{fault}"),
        }
    }
}

/// Why a run that was not aborted ended before the end of its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exit { index: usize },
    HaltOnFailure { index: usize },
}

/// Final status of one command in the list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub index: usize,
    pub line_number: usize,
    pub name: String,
    pub text: String,
    pub status: Status,
    pub messages: Vec<String>,
    pub inert: bool,
}

/// Result of a run: every command's outcome in list order plus the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub state: RunState,
    /// Most severe status over the executed commands.
    pub status: Status,
    pub outcomes: Vec<CommandOutcome>,
    pub stop: Option<StopReason>,
    pub abort: Option<AbortReason>,
}

impl RunResult {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state == RunState::Aborted
    }

    #[must_use]
    pub fn outcome(&self, index: usize) -> Option<&CommandOutcome> {
        self.outcomes.get(index)
    }

    #[must_use]
    pub fn outcome_at_line(&self, line_number: usize) -> Option<&CommandOutcome> {
        self.outcomes.iter().find(|o| o.line_number == line_number)
    }

    /// Executable commands that ended in `FAILURE`.
    pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.outcomes.iter().filter(|o| o.status == Status::Failure)
    }
}

enum Frame {
    Loop {
        name: String,
        iterator: String,
        values: Vec<Value>,
        position: usize,
        start: usize,
    },
    Conditional {
        name: String,
        start: usize,
    },
}

impl Frame {
    fn name(&self) -> &str {
        match self {
            Frame::Loop { name, .. } | Frame::Conditional { name, .. } => name,
        }
    }

    /// Plan position of the command that opened the block.
    fn start(&self) -> usize {
        match self {
            Frame::Loop { start, .. } | Frame::Conditional { start, .. } => *start,
        }
    }

    fn role(&self) -> ControlRole {
        match self {
            Frame::Loop { .. } => ControlRole::For,
            Frame::Conditional { .. } => ControlRole::If,
        }
    }
}

/// Mutable state of one walk over a plan.
struct Walk {
    plan: Vec<usize>,
    stack: Vec<Frame>,
    iterations: usize,
    flags: RunFlags,
}

type Step = std::result::Result<usize, EngineFault>;

impl Processor {
    /// Run every command in list order.
    pub fn run_all(&mut self) -> RunResult {
        let plan = (0..self.commands.len()).collect();
        self.execute_plan(plan)
    }

    /// Run only the commands at `indices`, in list order.
    ///
    /// Out-of-range indices are ignored. Block commands in the selection need
    /// their terminators selected too.
    pub fn run_selected(&mut self, indices: &[usize]) -> RunResult {
        let mut plan: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| *i < self.commands.len())
            .collect();
        plan.sort_unstable();
        plan.dedup();
        self.execute_plan(plan)
    }

    fn execute_plan(&mut self, plan: Vec<usize>) -> RunResult {
        for command in &mut self.commands {
            command.status_mut().reset();
        }
        self.state = RunState::Running;

        let mut walk = Walk {
            plan,
            stack: Vec::new(),
            iterations: 0,
            flags: RunFlags {
                halt_on_failure: self.config.halt_on_failure,
                exit_requested: false,
            },
        };
        let mut stop = None;
        let mut abort = None;
        let mut ip = 0;

        info!("Running {} of {} commands", walk.plan.len(), self.commands.len());

        while ip < walk.plan.len() {
            let index = walk.plan[ip];

            if self.commands[index].is_inert() {
                ip += 1;
                continue;
            }

            if self.cancel.is_cancelled() {
                self.record(index, CommandPhase::Run, Status::Failure, "Run cancelled", None);
                warn!("Run cancelled at line {}", self.commands[index].line_number());
                abort = Some(AbortReason::Cancelled);
                break;
            }

            let failures_before = self.commands[index].status().failure_count();

            let step = match self.commands[index].control_role() {
                Some(ControlRole::For) => self.step_for(&mut walk, ip),
                Some(ControlRole::EndFor) => self.step_end_block(&mut walk, ip, ControlRole::For),
                Some(ControlRole::If) => self.step_if(&mut walk, ip),
                Some(ControlRole::EndIf) => self.step_end_block(&mut walk, ip, ControlRole::If),
                None => {
                    self.execute_command(index, &mut walk.flags);
                    Ok(ip + 1)
                }
            };

            match step {
                Ok(next) => ip = next,
                Err(fault) => {
                    error!("Run aborted: {fault}");
                    self.record(index, CommandPhase::Run, Status::Failure, fault.to_string(), None);
                    abort = Some(AbortReason::Fault(fault));
                    break;
                }
            }

            if walk.flags.exit_requested {
                info!("Exit requested at line {}", self.commands[index].line_number());
                stop = Some(StopReason::Exit { index });
                break;
            }

            if walk.flags.halt_on_failure
                && self.commands[index].status().failure_count() > failures_before
            {
                warn!(
                    "Halting after failure at line {}",
                    self.commands[index].line_number()
                );
                stop = Some(StopReason::HaltOnFailure { index });
                break;
            }
        }

        if stop.is_none() && abort.is_none() {
            let unclosed = walk
                .stack
                .last()
                .map(|frame| (walk.plan[frame.start()], frame.role(), frame.name().to_string()));
            if let Some((index, role, name)) = unclosed {
                let fault = self.missing_terminator(index, role, &name);
                error!("Run aborted: {fault}");
                self.record(index, CommandPhase::Run, Status::Failure, fault.to_string(), None);
                abort = Some(AbortReason::Fault(fault));
            }
        }

        self.state = if abort.is_some() {
            RunState::Aborted
        } else {
            RunState::Completed
        };

        let result = self.collect_result(stop, abort);
        info!("Run finished: {:?}, status {}", result.state, result.status);
        result
    }

    fn collect_result(&self, stop: Option<StopReason>, abort: Option<AbortReason>) -> RunResult {
        let outcomes: Vec<CommandOutcome> = self
            .commands
            .iter()
            .enumerate()
            .map(|(index, command)| CommandOutcome {
                index,
                line_number: command.line_number(),
                name: command.name().to_string(),
                text: command.to_command_string(),
                status: command.status().overall(),
                messages: command
                    .status()
                    .records()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                inert: command.is_inert(),
            })
            .collect();

        let status = outcomes
            .iter()
            .map(|o| o.status)
            .max()
            .unwrap_or_default();

        RunResult {
            state: self.state,
            status,
            outcomes,
            stop,
            abort,
        }
    }

    fn record(
        &mut self,
        index: usize,
        phase: CommandPhase,
        severity: Status,
        problem: impl Into<String>,
        recommendation: Option<String>,
    ) {
        self.commands[index]
            .status_mut()
            .add_record(phase, severity, problem, recommendation);
    }

    /// Expand and validate the parameters of the command at `index`.
    ///
    /// Returns `None`, with the problems recorded as validation failures, if
    /// the command must not run.
    fn prepare(&mut self, index: usize) -> Option<ParameterSet> {
        let command = &self.commands[index];
        let line = command.line_number();

        let (definition, behavior) = match command.kind() {
            CommandKind::Known {
                definition,
                behavior,
            } => (definition.clone(), behavior.clone()),
            CommandKind::Unknown { suggestion } => {
                let problem = format!("Unknown command `{}`", command.name());
                let recommendation = suggestion
                    .as_ref()
                    .map(|s| format!("Did you mean `{s}`?"));
                error!("Line {line}: {problem}");
                self.record(index, CommandPhase::Validation, Status::Failure, problem, recommendation);
                return None;
            }
            CommandKind::Malformed { reason } => {
                let problem = format!("Could not parse command: {reason}");
                error!("Line {line}: {problem}");
                self.record(
                    index,
                    CommandPhase::Validation,
                    Status::Failure,
                    problem,
                    Some("Fix the command syntax".to_string()),
                );
                return None;
            }
            CommandKind::Blank | CommandKind::Comment => return None,
        };

        let workspace = &self.workspace;
        let raw = interpolate_parameters(command.parameters(), |name| workspace.property_text(name));
        debug!("Line {line}: expanded parameters {raw:?}");

        let validated = validate_parameters(&definition, &raw, &workspace.working_dir())
            .and_then(|params| {
                let problems = behavior.validate(&params);
                if problems.is_empty() {
                    Ok(params)
                } else {
                    Err(problems)
                }
            });

        match validated {
            Ok(params) => {
                self.commands[index]
                    .status_mut()
                    .promote(CommandPhase::Validation, Status::Success);
                Some(params)
            }
            Err(problems) => {
                for problem in problems {
                    error!("Line {line}: {}", problem.problem);
                    self.record(
                        index,
                        CommandPhase::Validation,
                        Status::Failure,
                        problem.problem,
                        Some(problem.recommendation),
                    );
                }
                None
            }
        }
    }

    fn execute_command(&mut self, index: usize, flags: &mut RunFlags) {
        let Some(params) = self.prepare(index) else {
            return;
        };
        let CommandKind::Known { behavior, .. } = self.commands[index].kind() else {
            return;
        };
        let behavior = behavior.clone();
        let name = self.commands[index].name().to_string();
        let line = self.commands[index].line_number();

        info!("Line {line}: running {name}");

        let mut status = std::mem::take(self.commands[index].status_mut());
        let outcome = {
            let mut ctx = CommandContext::new(
                &mut self.workspace,
                &self.registry,
                &self.config,
                &self.cancel,
                flags,
                &mut status,
                &name,
                self.depth,
            );
            behavior.run(&params, &mut ctx)
        };

        match outcome {
            Ok(()) => status.promote(CommandPhase::Run, Status::Success),
            Err(e) => {
                error!("Line {line}: {name} failed: {e}");
                status.add_record(CommandPhase::Run, Status::Failure, e.to_string(), None);
            }
        }
        *self.commands[index].status_mut() = status;
    }

    /// Plan position of the terminator closing the block opened at `ip`.
    fn find_block_end(&self, walk: &Walk, ip: usize, terminator: ControlRole, name: &str) -> Option<usize> {
        walk.plan
            .iter()
            .enumerate()
            .skip(ip + 1)
            .find(|(_, index)| {
                let command = &self.commands[**index];
                command.control_role() == Some(terminator)
                    && command.parameter("Name").map(str::trim) == Some(name)
            })
            .map(|(position, _)| position)
    }

    /// Raw `Name` of a block command, for skipping a block that failed validation.
    fn raw_block_name(&self, index: usize) -> String {
        self.commands[index]
            .parameter("Name")
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    fn missing_terminator(&self, index: usize, role: ControlRole, name: &str) -> EngineFault {
        let terminator = role.terminator().unwrap_or(role);
        EngineFault::MissingTerminator {
            command: self.commands[index].name().to_string(),
            terminator: format!("{terminator:?}"),
            name: name.to_string(),
            line: self.commands[index].line_number(),
        }
    }

    /// Skip past the block opened at `ip` without running it.
    fn skip_block(&self, walk: &Walk, ip: usize, role: ControlRole) -> Step {
        let index = walk.plan[ip];
        let name = self.raw_block_name(index);
        let terminator = role.terminator().unwrap_or(role);
        self.find_block_end(walk, ip, terminator, &name)
            .map(|end| end + 1)
            .ok_or_else(|| self.missing_terminator(index, role, &name))
    }

    fn open_block_checks(&self, walk: &Walk, ip: usize, role: ControlRole, name: &str) -> Step {
        let index = walk.plan[ip];

        if walk
            .stack
            .iter()
            .any(|frame| frame.role() == role && frame.name() == name)
        {
            return Err(EngineFault::DuplicateBlockName {
                command: self.commands[index].name().to_string(),
                name: name.to_string(),
                line: self.commands[index].line_number(),
            });
        }

        let terminator = role.terminator().unwrap_or(role);
        self.find_block_end(walk, ip, terminator, name)
            .ok_or_else(|| self.missing_terminator(index, role, name))
    }

    fn count_iteration(&self, walk: &mut Walk) -> std::result::Result<(), EngineFault> {
        walk.iterations += 1;
        if walk.iterations > self.config.max_loop_iterations {
            return Err(EngineFault::IterationLimit {
                limit: self.config.max_loop_iterations,
            });
        }
        Ok(())
    }

    fn step_for(&mut self, walk: &mut Walk, ip: usize) -> Step {
        let index = walk.plan[ip];
        let Some(params) = self.prepare(index) else {
            return self.skip_block(walk, ip, ControlRole::For);
        };

        let name = params.str("Name").unwrap_or_default().to_string();
        let end = self.open_block_checks(walk, ip, ControlRole::For, &name)?;

        let values = match loop_values(&params, &self.workspace, self.config.max_loop_iterations) {
            Ok(values) => values,
            Err(e) => {
                error!("Line {}: {e}", self.commands[index].line_number());
                self.record(index, CommandPhase::Run, Status::Failure, e.to_string(), None);
                return Ok(end + 1);
            }
        };

        let iterator = params
            .str("IteratorProperty")
            .unwrap_or(name.as_str())
            .to_string();

        let Some(first) = values.first().cloned() else {
            self.record(
                index,
                CommandPhase::Run,
                Status::Success,
                format!("Loop `{name}` has no values; body skipped"),
                None,
            );
            return Ok(end + 1);
        };

        self.count_iteration(walk)?;
        debug!("Loop `{name}`: {iterator} = {first}");
        self.workspace.set_property(&iterator, first);
        self.commands[index]
            .status_mut()
            .promote(CommandPhase::Run, Status::Success);

        walk.stack.push(Frame::Loop {
            name,
            iterator,
            values,
            position: 0,
            start: ip,
        });
        Ok(ip + 1)
    }

    fn step_if(&mut self, walk: &mut Walk, ip: usize) -> Step {
        let index = walk.plan[ip];
        let Some(params) = self.prepare(index) else {
            return self.skip_block(walk, ip, ControlRole::If);
        };

        let name = params.str("Name").unwrap_or_default().to_string();
        let end = self.open_block_checks(walk, ip, ControlRole::If, &name)?;

        match evaluate_if(&params, &self.workspace) {
            Ok(true) => {
                self.commands[index]
                    .status_mut()
                    .promote(CommandPhase::Run, Status::Success);
                walk.stack.push(Frame::Conditional { name, start: ip });
                Ok(ip + 1)
            }
            Ok(false) => {
                self.record(
                    index,
                    CommandPhase::Run,
                    Status::Success,
                    format!("Condition of `{name}` is false; block skipped"),
                    None,
                );
                Ok(end + 1)
            }
            Err(e) => {
                error!("Line {}: {e}", self.commands[index].line_number());
                self.record(index, CommandPhase::Run, Status::Failure, e.to_string(), None);
                Ok(end + 1)
            }
        }
    }

    /// `EndFor` (opened by `For`) or `EndIf` (opened by `If`).
    fn step_end_block(&mut self, walk: &mut Walk, ip: usize, opener: ControlRole) -> Step {
        let index = walk.plan[ip];
        // A terminator that fails validation still closes its block.
        let name = match self.prepare(index) {
            Some(params) => params.str("Name").unwrap_or_default().to_string(),
            None => self.raw_block_name(index),
        };

        let top_matches = walk
            .stack
            .last()
            .is_some_and(|frame| frame.role() == opener && frame.name() == name);

        if !top_matches {
            let open_lower = walk
                .stack
                .iter()
                .any(|frame| frame.role() == opener && frame.name() == name);

            if open_lower {
                let open = walk.stack.last().map(Frame::name).unwrap_or_default();
                return Err(EngineFault::ImproperNesting {
                    command: self.commands[index].name().to_string(),
                    name,
                    open: open.to_string(),
                    line: self.commands[index].line_number(),
                });
            }

            let problem = format!(
                "{}(Name=\"{name}\") has no matching open {opener:?}",
                self.commands[index].name()
            );
            error!("Line {}: {problem}", self.commands[index].line_number());
            self.record(
                index,
                CommandPhase::Run,
                Status::Failure,
                problem,
                Some(format!("Add a matching {opener:?} or remove this line")),
            );
            return Ok(ip + 1);
        }

        self.commands[index]
            .status_mut()
            .promote(CommandPhase::Run, Status::Success);

        let rebind = match walk.stack.last_mut() {
            Some(Frame::Loop {
                iterator,
                values,
                position,
                start,
                ..
            }) => {
                *position += 1;
                values
                    .get(*position)
                    .cloned()
                    .map(|value| (iterator.clone(), value, *start))
            }
            _ => None,
        };

        match rebind {
            Some((iterator, value, start)) => {
                self.count_iteration(walk)?;
                debug!("Loop `{name}`: {iterator} = {value}");
                self.workspace.set_property(&iterator, value);
                Ok(start + 1)
            }
            None => {
                walk.stack.pop();
                Ok(ip + 1)
            }
        }
    }
}
