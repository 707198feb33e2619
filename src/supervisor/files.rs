//! Persisted identity of the coordination store process
//!
//! - pid file: a single decimal process id
//! - environment file: `KEY=VALUE` lines, the environment of the launch

use crate::common::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Pid file of the store process
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded pid. `None` when the file is missing or does not hold a pid.
    pub fn read(&self) -> Result<Option<u32>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to read pid file");
                return Err(e.into());
            }
        };

        match contents.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => Ok(Some(pid)),
            _ => {
                tracing::error!(
                    path = %self.path.display(),
                    contents = %contents.trim(),
                    "Pid file does not contain a process id"
                );
                Ok(None)
            }
        }
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        ensure_parent(&self.path)
            .and_then(|_| fs::write(&self.path, format!("{}\n", pid)).map_err(Error::from))
            .map_err(|e| {
                tracing::error!(
                    path = %self.path.display(),
                    pid,
                    error = %e,
                    "Failed to write pid file"
                );
                e
            })
    }

    /// Remove the pid file. A missing file is fine.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Environment file of the store process
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded environment. `None` when no environment was ever recorded.
    pub fn read(&self) -> Result<Option<Vec<(String, String)>>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(parse_env(&contents))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to read environment file");
                Err(e.into())
            }
        }
    }

    pub fn write(&self, vars: &[(String, String)]) -> Result<()> {
        for (key, value) in vars {
            if key.is_empty() || key.contains('=') || key.contains('\n') || value.contains('\n') {
                return Err(Error::InvalidConfig(format!(
                    "environment entry {:?} cannot be stored",
                    key
                )));
            }
        }

        let contents: String = vars
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, value))
            .collect();

        ensure_parent(&self.path)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Parse `KEY=VALUE` lines. The value is everything after the first `=`.
pub fn parse_env(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.split_once('=') {
            Some((key, value)) if !key.is_empty() => Some((key.to_string(), value.to_string())),
            _ => {
                tracing::warn!(line = %line, "Ignoring malformed environment line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pid_file() {
        let dir = tempdir().unwrap();
        let pid_file = PidFile::new(dir.path().join("run/etcd.pid"));

        assert_eq!(pid_file.read().unwrap(), None);
        pid_file.write(4242).unwrap();
        assert_eq!(pid_file.read().unwrap(), Some(4242));

        pid_file.remove().unwrap();
        assert_eq!(pid_file.read().unwrap(), None);
        pid_file.remove().unwrap();
    }

    #[test]
    fn test_pid_file_garbage_means_no_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etcd.pid");
        let pid_file = PidFile::new(&path);

        fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(pid_file.read().unwrap(), None);

        fs::write(&path, "0").unwrap();
        assert_eq!(pid_file.read().unwrap(), None);

        // no trailing newline, as older writers produced
        fs::write(&path, "77").unwrap();
        assert_eq!(pid_file.read().unwrap(), Some(77));
    }

    #[test]
    fn test_parse_env_rejoins_values() {
        let vars = parse_env(
            "ETCD_NAME=node-2\n\
             ETCD_INITIAL_CLUSTER=node-1=http://10.0.0.1:2380,node-2=http://10.0.0.2:2380\n\
             \n\
             garbage\n\
             ETCD_INITIAL_CLUSTER_STATE=existing\n",
        );
        assert_eq!(
            vars,
            vec![
                ("ETCD_NAME".to_string(), "node-2".to_string()),
                (
                    "ETCD_INITIAL_CLUSTER".to_string(),
                    "node-1=http://10.0.0.1:2380,node-2=http://10.0.0.2:2380".to_string()
                ),
                ("ETCD_INITIAL_CLUSTER_STATE".to_string(), "existing".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_file_round_trip() {
        let dir = tempdir().unwrap();
        let env_file = EnvFile::new(dir.path().join("lib/etcdenv.conf"));
        assert_eq!(env_file.read().unwrap(), None);

        let vars = vec![
            ("ETCD_NAME".to_string(), "node-2".to_string()),
            ("ETCD_INITIAL_CLUSTER".to_string(), "a=http://x,b=http://y".to_string()),
        ];
        env_file.write(&vars).unwrap();
        assert_eq!(env_file.read().unwrap(), Some(vars));

        let bad = vec![("BAD=KEY".to_string(), "v".to_string())];
        assert!(env_file.write(&bad).is_err());
    }
}
