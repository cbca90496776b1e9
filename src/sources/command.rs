use crate::errors::SourceError;
use crate::model::{self, Entry};
use crate::sources::Source;
use log::{debug, info, warn};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Runs an external command whose stdout is `kind<TAB>path` lines.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    home: Option<PathBuf>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
            home: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Home directory used to abbreviate display paths.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Run the command and return its stdout.
    pub fn run(&self) -> Result<String, SourceError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain stdout on a separate thread so a chatty child can't fill the
        // pipe and stall while we wait on it.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let status = self.wait(&mut child)?;
        if !status.success() {
            return Err(SourceError::Status {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        let buf = reader
            .join()
            .map_err(|_| std::io::Error::other("stdout reader panicked"))??;
        String::from_utf8(buf).map_err(|_| SourceError::Encoding {
            program: self.program.clone(),
        })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, SourceError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let start = Instant::now();
        let mut delay_ms = 10u64;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() > timeout {
                warn!("{} timed out after {:?}, killing it", self.program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::Timeout {
                    program: self.program.clone(),
                    timeout_ms: timeout.as_millis(),
                });
            }
            thread::sleep(Duration::from_millis(delay_ms));
            delay_ms = (delay_ms * 2).min(200);
        }
    }
}

impl Source for CommandSource {
    fn fetch(&self) -> Result<Vec<Entry>, SourceError> {
        debug!("Running {} {:?}", self.program, self.args);
        let output = self.run()?;
        let entries = model::parse_output(&output, self.home.as_deref());
        info!("CommandSource: found {} entries", entries.len());
        Ok(entries)
    }
}
