use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::env::TargetEnv;
use crate::error::{Error, ParseError};
use crate::model::{Entry, LoadReport, ParseMode};
use crate::parser::parse_input;

const DEFAULT_FILE: &str = ".env";

/// Load `.env` from the current working directory into the process
/// environment.
///
/// # Safety
///
/// See [`load`].
pub unsafe fn dotenv() -> Result<LoadReport, Error> {
    unsafe { from_filename(DEFAULT_FILE) }
}

/// Load the file named `filename` in the current working directory into the
/// process environment.
///
/// # Safety
///
/// See [`load`].
pub unsafe fn from_filename(filename: &str) -> Result<LoadReport, Error> {
    unsafe { from_path(filename) }
}

/// Load the file at `path` into the process environment.
///
/// # Safety
///
/// See [`load`].
pub unsafe fn from_path(path: impl AsRef<Path>) -> Result<LoadReport, Error> {
    unsafe { load(path) }
}

/// Load a `.env` file into the process environment.
///
/// Every valid line sets a variable, replacing any previous value. Malformed
/// lines are skipped and counted in [`LoadReport::skipped_invalid`]; the only
/// error is failing to read the file, in which case nothing is set.
///
/// # Safety
///
/// The caller must ensure no other threads concurrently read or write the
/// process environment while this function runs.
pub unsafe fn load(path: impl AsRef<Path>) -> Result<LoadReport, Error> {
    let mut loader = EnvLoader::new()
        .path(path)
        .target(unsafe { TargetEnv::process() });
    loader.load()
}

/// Load several `.env` files into the process environment, later files
/// taking precedence.
///
/// # Safety
///
/// See [`load`].
pub unsafe fn from_paths<I, P>(paths: I) -> Result<LoadReport, Error>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut loader = EnvLoader::new()
        .paths(paths)
        .target(unsafe { TargetEnv::process() });
    loader.load()
}

/// Builder-style dotenv loader.
///
/// Writes to an in-memory [`TargetEnv`] unless another target is given, so
/// using it never touches the process environment by accident.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    paths: Vec<PathBuf>,
    required: bool,
    override_existing: bool,
    parse_mode: ParseMode,
    target: TargetEnv,
}

struct Collected {
    entries: Vec<Entry>,
    files_read: usize,
    invalid: Vec<ParseError>,
}

impl EnvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.paths
            .extend(paths.into_iter().map(|path| path.as_ref().to_path_buf()));
        self
    }

    /// When `false`, files that do not exist are skipped instead of failing
    /// the load.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// When `false`, keys already present in the target keep their value.
    pub fn override_existing(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    pub fn parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    pub fn target(mut self, target: TargetEnv) -> Self {
        self.target = target;
        self
    }

    pub fn target_env(&self) -> &TargetEnv {
        &self.target
    }

    pub fn target_env_mut(&mut self) -> &mut TargetEnv {
        &mut self.target
    }

    pub fn into_target(self) -> TargetEnv {
        self.target
    }

    /// Read and parse every file without applying anything.
    pub fn parse_only(&self) -> Result<Vec<Entry>, Error> {
        Ok(self.collect_entries(self.parse_mode)?.entries)
    }

    /// Read and parse every file, returning one error per malformed line.
    ///
    /// Always parses leniently so that every problem is reported; the target
    /// is not touched.
    pub fn check(&self) -> Result<Vec<ParseError>, Error> {
        Ok(self.collect_entries(ParseMode::Lenient)?.invalid)
    }

    /// Read, parse and apply every file to the target.
    ///
    /// All files are parsed before the first variable is set, so a read
    /// failure leaves the target untouched.
    pub fn load(&mut self) -> Result<LoadReport, Error> {
        let collected = self.collect_entries(self.parse_mode)?;
        let mut report = LoadReport {
            files_read: collected.files_read,
            skipped_invalid: collected.invalid.len(),
            ..LoadReport::default()
        };

        for entry in collected.entries {
            if !self.override_existing && self.target.contains_key(&entry.key) {
                tracing::debug!(key = %entry.key, "keeping existing value");
                report.skipped_existing += 1;
                continue;
            }

            self.target.set_var(&entry.key, &entry.value);
            tracing::trace!(key = %entry.key, line = entry.line, "set variable");
            report.loaded += 1;
        }

        tracing::debug!(
            loaded = report.loaded,
            skipped_existing = report.skipped_existing,
            skipped_invalid = report.skipped_invalid,
            files_read = report.files_read,
            "dotenv load finished"
        );
        Ok(report)
    }

    fn collect_entries(&self, parse_mode: ParseMode) -> Result<Collected, Error> {
        let mut collected = Collected {
            entries: Vec::new(),
            files_read: 0,
            invalid: Vec::new(),
        };
        let mut by_key = HashMap::<String, usize>::new();

        for path in self.effective_paths() {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound && !self.required => {
                    tracing::debug!(path = %path.display(), "skipping missing dotenv file");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            tracing::debug!(path = %path.display(), "reading dotenv file");
            collected.files_read += 1;

            let parsed = parse_input(&bytes, Some(&path), parse_mode)?;
            collected.invalid.extend(parsed.invalid);

            for entry in parsed.entries {
                if let Some(existing_idx) = by_key.get(&entry.key).copied() {
                    collected.entries[existing_idx] = entry;
                } else {
                    by_key.insert(entry.key.clone(), collected.entries.len());
                    collected.entries.push(entry);
                }
            }
        }

        Ok(collected)
    }

    fn effective_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(DEFAULT_FILE)]
        } else {
            self.paths.clone()
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            required: true,
            override_existing: true,
            parse_mode: ParseMode::Lenient,
            target: TargetEnv::memory(),
        }
    }
}
