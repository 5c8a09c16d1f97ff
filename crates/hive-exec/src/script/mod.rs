//! Job execution scripts: an isolated bash environment, materialised to disk and
//! supervised as its own process group.

mod handle;
pub use handle::ScriptHandle;

mod run;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

pub const WORKING_DIRECTORY_VAR: &str = "HIVE_WORKING_DIRECTORY";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Value of an exported variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Scalar(String),
    /// Exported as a bash array.
    List(Vec<String>),
}

impl From<&str> for EnvValue {
    fn from(v: &str) -> Self {
        EnvValue::Scalar(v.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(v: String) -> Self {
        EnvValue::Scalar(v)
    }
}

impl From<&Path> for EnvValue {
    fn from(v: &Path) -> Self {
        EnvValue::Scalar(v.display().to_string())
    }
}

impl From<Vec<String>> for EnvValue {
    fn from(v: Vec<String>) -> Self {
        EnvValue::List(v)
    }
}

/// A shell script under construction, and later its supervised run.
#[derive(Debug)]
pub struct ExecutionScript {
    path: PathBuf,
    logs_dir: PathBuf,
    helper: Option<PathBuf>,
    env: BTreeMap<String, EnvValue>,
    env_unset: Vec<String>,
    env_secure: BTreeMap<String, String>,
    lines: Vec<String>,
    poll_interval: Duration,
    handle: ScriptHandle,
}

impl ExecutionScript {
    /// `path` is where the script is written; stdout and stderr go to `logs_dir`.
    pub fn new(path: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(target: "hive.exec.script", path = %path.display(), "creating execution script");
        Self {
            path,
            logs_dir: logs_dir.into(),
            helper: None,
            env: BTreeMap::new(),
            env_unset: Vec::new(),
            env_secure: BTreeMap::new(),
            lines: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            handle: ScriptHandle::default(),
        }
    }

    /// Shell file sourced before anything else.
    pub fn with_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.helper = Some(helper.into());
        self
    }

    /// How often the watchdog consults `keep_running`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Handle able to kill the running script from elsewhere (e.g. a signal path).
    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }

    pub fn set_env(&mut self, var: impl Into<String>, value: impl Into<EnvValue>) {
        let var = var.into();
        self.env_unset.retain(|v| *v != var);
        self.env.insert(var, value.into());
    }

    /// Strip `var` from the inherited environment.
    pub fn unset_env(&mut self, var: impl Into<String>) {
        let var = var.into();
        self.env.remove(&var);
        if !self.env_unset.contains(&var) {
            self.env_unset.push(var);
        }
    }

    pub fn get_env(&self, var: &str) -> Option<&EnvValue> {
        self.env.get(var)
    }

    /// Variable passed to the process at spawn time only; never written to the script.
    pub fn set_secure_env(&mut self, var: impl Into<String>, value: impl Into<String>) {
        self.env_secure.insert(var.into(), value.into());
    }

    pub fn append_bash_cmd(&mut self, cmd: impl Into<String>) {
        let cmd = cmd.into();
        debug!(target: "hive.exec.script", %cmd, "appending command");
        self.lines.push(cmd);
    }

    pub fn prepend_bash_cmd(&mut self, cmd: impl Into<String>) {
        let cmd = cmd.into();
        debug!(target: "hive.exec.script", %cmd, "prepending command");
        self.lines.insert(0, cmd);
    }

    /// Script text as written to disk.
    pub fn render(&self) -> String {
        let mut out = String::from("#!/usr/bin/env bash\n");
        if let Some(helper) = &self.helper {
            out.push_str(&format!(". {}\n", shell_quote(&helper.display().to_string())));
        }
        out.push_str("# Set environment\n");
        for (key, value) in &self.env {
            match value {
                EnvValue::Scalar(v) => out.push_str(&format!("export {key}={}\n", shell_quote(v))),
                EnvValue::List(items) => {
                    let items: Vec<String> = items.iter().map(|i| shell_quote(i)).collect();
                    out.push_str(&format!("export {key}=({})\n", items.join(" ")));
                }
            }
        }
        for var in &self.env_unset {
            out.push_str(&format!("unset {var}\n"));
        }
        if self.env.contains_key(WORKING_DIRECTORY_VAR) {
            out.push_str(&format!("cd \"${WORKING_DIRECTORY_VAR}\"\n"));
        }
        out.push_str("# Test execution\n");
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Single-quote for bash; an embedded `'` becomes `'"'"'`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> ExecutionScript {
        ExecutionScript::new("/tmp/job/executed_script.sh", "/tmp/job/logs")
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn renders_sections_in_order() {
        let mut s = script().with_helper("/opt/hive/hive-script-helper.sh");
        s.set_env(WORKING_DIRECTORY_VAR, "/tmp/job/testbed");
        s.set_env("HIVE_NAME", "it's");
        s.set_env("TEST_NAMES", vec!["a b".to_string(), "c".to_string()]);
        s.unset_env("GEM_PATH");
        s.append_bash_cmd("echo second");
        s.prepend_bash_cmd("echo first");
        s.set_secure_env("HIVE_CERT", "secret-cert");

        let expected = "#!/usr/bin/env bash\n\
            . '/opt/hive/hive-script-helper.sh'\n\
            # Set environment\n\
            export HIVE_NAME='it'\"'\"'s'\n\
            export HIVE_WORKING_DIRECTORY='/tmp/job/testbed'\n\
            export TEST_NAMES=('a b' 'c')\n\
            unset GEM_PATH\n\
            cd \"$HIVE_WORKING_DIRECTORY\"\n\
            # Test execution\n\
            echo first\n\
            echo second\n";
        assert_eq!(s.render(), expected);
        assert!(!s.render().contains("secret-cert"));
    }

    #[test]
    fn set_and_unset_are_exclusive() {
        let mut s = script();
        s.unset_env("RUBYOPT");
        s.set_env("RUBYOPT", "-w");
        assert!(!s.render().contains("unset RUBYOPT"));
        assert_eq!(s.get_env("RUBYOPT"), Some(&EnvValue::from("-w")));

        s.unset_env("RUBYOPT");
        assert_eq!(s.get_env("RUBYOPT"), None);
        assert_eq!(s.render().matches("unset RUBYOPT").count(), 1);
    }
}
