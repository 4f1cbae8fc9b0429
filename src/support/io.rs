//! File options that may name a path or one of the standard streams.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOption {
    Stdin,
    Stdout,
    Stderr,
    Path(PathBuf),
}

impl FileOption {
    /// Map the keywords `STDIN`, `STDOUT` and `STDERR`, or treat the value as a path.
    pub fn parse(value: &str) -> Self {
        match value {
            "STDIN" => FileOption::Stdin,
            "STDOUT" => FileOption::Stdout,
            "STDERR" => FileOption::Stderr,
            path => FileOption::Path(PathBuf::from(path)),
        }
    }

    /// Open the option for streaming reads.
    pub fn open_input(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            FileOption::Stdin => Ok(Box::new(io::stdin())),
            FileOption::Path(path) => Ok(Box::new(File::open(path)?)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not readable", other),
            )),
        }
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        let mut contents = String::new();
        self.open_input()?.read_to_string(&mut contents)?;
        Ok(contents)
    }

    /// Open the option for appending, used for log output.
    pub fn open_append(&self) -> io::Result<Box<dyn Write + Send>> {
        match self {
            FileOption::Stdout => Ok(Box::new(io::stdout())),
            FileOption::Stderr => Ok(Box::new(io::stderr())),
            FileOption::Path(path) => Ok(Box::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            FileOption::Stdin => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "STDIN is not writable",
            )),
        }
    }

    /// Write a complete document followed by a newline.
    ///
    /// Paths are replaced atomically: readers never observe a partial document.
    pub fn write_document(&self, contents: &str) -> io::Result<()> {
        match self {
            FileOption::Stdout => write_line(&mut io::stdout().lock(), contents),
            FileOption::Stderr => write_line(&mut io::stderr().lock(), contents),
            FileOption::Path(path) => write_atomic(path, contents),
            FileOption::Stdin => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "STDIN is not writable",
            )),
        }
    }
}

impl fmt::Display for FileOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOption::Stdin => f.write_str("STDIN"),
            FileOption::Stdout => f.write_str("STDOUT"),
            FileOption::Stderr => f.write_str("STDERR"),
            FileOption::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn write_line(out: &mut impl Write, contents: &str) -> io::Result<()> {
    out.write_all(contents.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    write_line(&mut temp, contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
