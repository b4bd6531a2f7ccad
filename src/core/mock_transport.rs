//! Mock transports and fingerprinters for tests
//!
//! [`StaticTransport`] answers every command with one canned result and
//! records what it was asked; [`ScriptedTransport`] matches commands against
//! substring rules and plays back per-rule response sequences, which is what
//! the bootstrap state-machine tests need to simulate a host changing state
//! across reboot cycles.

use crate::core::fingerprint::Fingerprinter;
use crate::core::transport::{CommandResult, Transport};
use crate::models::{OsClass, Target};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Transport returning the same result for every command
pub struct StaticTransport {
    name: &'static str,
    result: CommandResult,
    pub calls: Mutex<Vec<String>>,
    pub guest_calls: Mutex<Vec<(String, String)>>,
}

impl StaticTransport {
    pub fn new(name: &'static str, result: CommandResult) -> Self {
        Self {
            name,
            result,
            calls: Mutex::new(Vec::new()),
            guest_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn exec_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn guest_exec_count(&self) -> usize {
        self.guest_calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for StaticTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn exec(&self, _target: &Target, command: &str) -> CommandResult {
        self.calls.lock().unwrap().push(command.to_string());
        self.result.clone()
    }

    async fn exec_in_guest(&self, _target: &Target, command: &str, distro: &str) -> CommandResult {
        self.guest_calls
            .lock()
            .unwrap()
            .push((command.to_string(), distro.to_string()));
        self.result.clone()
    }
}

struct Rule {
    needle: &'static str,
    responses: Mutex<VecDeque<CommandResult>>,
}

/// Transport that matches each command against substring rules, in rule
/// order, and plays back that rule's response sequence.
///
/// A rule with several responses pops them one by one; a rule down to its
/// last response repeats it. Commands matching no rule answer with a
/// generic success so incidental probes do not derail a scripted scenario.
pub struct ScriptedTransport {
    name: &'static str,
    rules: Vec<Rule>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a rule: commands containing `needle` answer with `responses`
    /// in order, repeating the last one once the sequence runs out.
    pub fn on(mut self, needle: &'static str, responses: Vec<CommandResult>) -> Self {
        assert!(!responses.is_empty(), "rule needs at least one response");
        self.rules.push(Rule {
            needle,
            responses: Mutex::new(responses.into()),
        });
        self
    }

    /// How many recorded commands contained `needle`
    pub fn count_calls(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }

    fn respond(&self, command: &str) -> CommandResult {
        self.calls.lock().unwrap().push(command.to_string());

        for rule in &self.rules {
            if command.contains(rule.needle) {
                let mut responses = rule.responses.lock().unwrap();
                return if responses.len() == 1 {
                    responses.front().cloned().unwrap()
                } else {
                    responses.pop_front().unwrap()
                };
            }
        }
        CommandResult::with_exit("", 0)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn exec(&self, _target: &Target, command: &str) -> CommandResult {
        self.respond(command)
    }

    async fn exec_in_guest(&self, _target: &Target, command: &str, _distro: &str) -> CommandResult {
        self.respond(command)
    }
}

/// Fingerprinter returning a fixed verdict and counting probe calls
pub struct FixedFingerprinter {
    os: OsClass,
    calls: AtomicU32,
}

impl FixedFingerprinter {
    pub fn new(os: OsClass) -> Self {
        Self {
            os,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fingerprinter for FixedFingerprinter {
    async fn classify(&self, _address: &str) -> OsClass {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.os
    }
}
