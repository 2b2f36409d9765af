use crate::error::RunnerError;
use crate::process::CommandLogger;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Description of a job to run: who asked for it and what to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMeta {
    #[serde(default)]
    pub job_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandMeta {
    pub fn new<S: ToString, I: IntoIterator<Item = S>>(
        job_id: impl Into<String>,
        name: impl Into<String>,
        args: I,
    ) -> Self {
        Self {
            job_id: Some(job_id.into()),
            name: name.into(),
            args: args.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Program and arguments without job metadata
    pub fn command<S: ToString, I: IntoIterator<Item = S>>(name: impl Into<String>, args: I) -> Self {
        Self {
            job_id: None,
            name: name.into(),
            args: args.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Render `name arg1 arg2 ...` for log lines and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Construction-time options for a process runner
#[derive(Default, Clone, Builder)]
#[builder(
    setter(into, strip_option),
    build_fn(validate = "Self::validate")
)]
pub struct RunnerOptions {
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub logger: Option<Arc<dyn CommandLogger>>,
}

impl RunnerOptions {
    pub fn builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("working_directory", &self.working_directory)
            .field("env", &self.env)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl RunnerOptionsBuilder {
    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn logger<L: CommandLogger + 'static>(&mut self, logger: L) -> &mut Self {
        self.logger = Some(Some(Arc::new(logger)));
        self
    }

    /// Use a logger that is already shared with other components
    pub fn shared_logger(&mut self, logger: Arc<dyn CommandLogger>) -> &mut Self {
        self.logger = Some(Some(logger));
        self
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(env) = &self.env {
            for key in env.keys() {
                if key.is_empty() {
                    return Err("environment variable name cannot be empty".to_string());
                }
                if key.contains('=') || key.contains('\0') {
                    return Err(format!("invalid environment variable name: {key:?}"));
                }
            }
        }

        Ok(())
    }
}

impl From<RunnerOptionsBuilderError> for RunnerError {
    fn from(e: RunnerOptionsBuilderError) -> Self {
        RunnerError::InvalidOptions(e.to_string())
    }
}
