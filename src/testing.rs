//! In-memory stand-ins for the external collaborators, shared by unit tests.

use crate::classifier::MimeProbe;
use crate::error::{HashBakerError, Result};
use crate::fetcher::ScriptSource;
use crate::resolver::ExecutableLookup;
use crate::runner::{CommandRunner, OutputMode, ToolCommand, ToolOutput};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// Answers every probe with the same MIME type.
pub struct FixedProbe(pub Option<&'static str>);

impl MimeProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> Option<String> {
        self.0.map(str::to_string)
    }
}

#[derive(Clone, Default)]
pub struct FakeLookup {
    present: Rc<RefCell<HashMap<String, PathBuf>>>,
}

impl FakeLookup {
    pub fn with(names: &[&str]) -> Self {
        let lookup = Self::default();
        for name in names {
            lookup.add(name);
        }
        lookup
    }

    pub fn add(&self, name: &str) {
        self.present
            .borrow_mut()
            .insert(name.to_string(), PathBuf::from("/fake/bin").join(name));
    }
}

impl ExecutableLookup for FakeLookup {
    fn find(&self, executable: &str) -> Option<PathBuf> {
        self.present.borrow().get(executable).cloned()
    }
}

type Behaviour = dyn Fn(&ToolCommand) -> Result<ToolOutput>;

#[derive(Clone)]
pub struct RecordingRunner {
    calls: Rc<RefCell<Vec<ToolCommand>>>,
    behaviour: Rc<Behaviour>,
}

impl RecordingRunner {
    pub fn with<F>(behaviour: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<ToolOutput> + 'static,
    {
        Self {
            calls: Rc::default(),
            behaviour: Rc::new(behaviour),
        }
    }

    pub fn succeeding() -> Self {
        Self::with(|_| Ok(ToolOutput::default()))
    }

    pub fn printing(stdout: &[u8]) -> Self {
        let stdout = stdout.to_vec();
        Self::with(move |_| {
            Ok(ToolOutput {
                exit_code: 0,
                stdout: stdout.clone(),
                stderr: Vec::new(),
            })
        })
    }

    /// Simulates a package manager that makes `names` appear in `lookup`.
    pub fn installing(lookup: &FakeLookup, names: &[&str]) -> Self {
        let lookup = lookup.clone();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        Self::with(move |_| {
            for name in &names {
                lookup.add(name);
            }
            Ok(ToolOutput::default())
        })
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn(&ToolCommand) -> HashBakerError + 'static,
    {
        Self::with(move |command| Err(error(command)))
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &ToolCommand, _mode: OutputMode, _timeout: Duration) -> Result<ToolOutput> {
        self.calls.borrow_mut().push(command.clone());
        (self.behaviour)(command)
    }
}

type Response = dyn Fn(&mut dyn Write) -> io::Result<u64>;

#[derive(Clone)]
pub struct CountingSource {
    calls: Rc<Cell<usize>>,
    response: Rc<Response>,
}

impl CountingSource {
    pub fn serving(body: &[u8]) -> Self {
        let body = body.to_vec();
        Self::responding(move |sink| {
            sink.write_all(&body)?;
            Ok(body.len() as u64)
        })
    }

    /// Writes `partial` and then fails, like a connection dropped mid-transfer.
    pub fn dropping_after(partial: &[u8]) -> Self {
        let partial = partial.to_vec();
        Self::responding(move |sink| {
            sink.write_all(&partial)?;
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
        })
    }

    pub fn responding<F>(response: F) -> Self
    where
        F: Fn(&mut dyn Write) -> io::Result<u64> + 'static,
    {
        Self {
            calls: Rc::default(),
            response: Rc::new(response),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.get()
    }
}

impl ScriptSource for CountingSource {
    fn download(&self, _source: &Url, sink: &mut dyn Write) -> io::Result<u64> {
        self.calls.set(self.calls.get() + 1);
        (self.response)(sink)
    }
}

/// Sorted entry names of `directory`, empty if it cannot be read.
pub fn directory_entries(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(directory)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
