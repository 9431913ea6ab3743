//! Compilation database input: the conventional `compile_commands.json`
//! schema, one entry per translation unit.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{IndexError, Result};

pub const COMPDB_FILE: &str = "compile_commands.json";

/// One compile-commands entry. Exactly one of `command` (a shell string) or
/// `arguments` (a pre-split argv) is normally present.
#[derive(Deserialize, Debug, Clone)]
pub struct CompileCommand {
    pub directory: Option<String>,
    pub file: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    /// The argument list, verbatim. A `command` string is split on
    /// whitespace; compile commands do not quote the flags we consume.
    pub fn args(&self) -> Vec<String> {
        if let Some(arguments) = &self.arguments {
            return arguments.clone();
        }
        self.command
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// The source path, joined onto `directory` when relative.
    pub fn source_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.file);
        if file.is_absolute() {
            return file;
        }
        match &self.directory {
            Some(dir) => Path::new(dir).join(file),
            None => file,
        }
    }

    /// Include directories from `-I`/`-iquote` flags, joined onto
    /// `directory` when relative.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        include_dirs_from(&self.args(), self.directory.as_deref().map(Path::new))
    }
}

/// Extract `-I`/`-iquote` directories from an argument list, joining
/// relative ones onto `base`.
pub fn include_dirs_from(args: &[String], base: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let dir = if let Some(rest) = arg.strip_prefix("-I") {
            if rest.is_empty() {
                iter.next().map(String::as_str)
            } else {
                Some(rest)
            }
        } else if arg == "-iquote" {
            iter.next().map(String::as_str)
        } else {
            None
        };
        if let Some(dir) = dir {
            let mut path = PathBuf::from(dir);
            if path.is_relative() {
                if let Some(base) = base {
                    path = base.join(path);
                }
            }
            dirs.push(path);
        }
    }
    dirs
}

/// Default arguments synthesized for a single-source run.
pub fn default_args() -> Vec<String> {
    vec!["-std=c17".into(), "-x".into(), "c".into()]
}

/// Load `compile_commands.json` from `dir`.
pub fn load(dir: &Path) -> Result<Vec<CompileCommand>> {
    let path = dir.join(COMPDB_FILE);
    let text = std::fs::read_to_string(&path)?;
    let commands: Vec<CompileCommand> = serde_json::from_str(&text)?;
    if commands.is_empty() {
        return Err(IndexError::InvalidInput(format!(
            "{} lists no translation units",
            path.display()
        )));
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_args() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(COMPDB_FILE),
            r#"[
                {"directory": "/build", "file": "a.c", "command": "cc -I include -c a.c"},
                {"directory": "/build", "file": "/abs/b.c", "arguments": ["cc", "-Iinc", "-iquote", "quoted", "-c", "b.c"]}
            ]"#,
        )
        .unwrap();

        let commands = load(tmp.path()).unwrap();
        assert_eq!(commands.len(), 2);

        assert_eq!(commands[0].source_path(), PathBuf::from("/build/a.c"));
        assert_eq!(commands[0].include_dirs(), vec![PathBuf::from("/build/include")]);

        assert_eq!(commands[1].source_path(), PathBuf::from("/abs/b.c"));
        assert_eq!(
            commands[1].include_dirs(),
            vec![PathBuf::from("/build/inc"), PathBuf::from("/build/quoted")]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(load(tmp.path()), Err(IndexError::Io(_))));
    }

    #[test]
    fn test_load_rejects_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(COMPDB_FILE), "[]").unwrap();
        assert!(matches!(load(tmp.path()), Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(COMPDB_FILE), "{not json").unwrap();
        assert!(matches!(load(tmp.path()), Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn test_default_args_select_c17() {
        let args = default_args();
        assert!(args.contains(&"-std=c17".to_string()));
        assert!(args.contains(&"c".to_string()));
    }
}
