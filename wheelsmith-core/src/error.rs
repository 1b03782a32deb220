//! Failure of an external command (made for wheelsmith)

use std::io;

/// Exit code reported when a program cannot be started, as a POSIX shell does.
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// The one error kind of a build run: an external command did not succeed.
///
/// `command` is the rendered echo line of the failing invocation so the
/// user sees exactly what failed.
#[derive(thiserror::Error, Debug)]
pub enum StepError {
    #[error("command failed with exit code {code}: {command}")]
    Failed { command: String, code: i32 },

    #[error("command could not be started: {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl StepError {
    /// The exit code the whole process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            StepError::Failed { code, .. } => *code,
            StepError::Spawn { .. } => SPAWN_FAILURE_CODE,
        }
    }
}

/// Walk an error chain and return the exit code of the first failed step, if any.
pub fn step_exit_code(err: &anyhow::Error) -> Option<i32> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StepError>())
        .map(StepError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn failed_step_keeps_its_code() {
        let err = StepError::Failed {
            command: "+ pip install wheel==0.31.1".to_string(),
            code: 7,
        };
        assert_eq!(err.exit_code(), 7);
        assert!(err.to_string().contains("pip install"));
    }

    #[test]
    fn spawn_failure_maps_to_127() {
        let err = StepError::Spawn {
            command: "+ auditwheel repair a.whl".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.exit_code(), SPAWN_FAILURE_CODE);
    }

    #[test]
    fn exit_code_survives_context_layers() {
        let result: anyhow::Result<()> = Err(StepError::Failed {
            command: "+ python setup.py bdist_wheel".to_string(),
            code: 3,
        })
        .context("building cp36-cp36m")
        .context("build run aborted");

        let err = result.expect_err("error");
        assert_eq!(step_exit_code(&err), Some(3));
    }

    #[test]
    fn plain_errors_have_no_step_code() {
        let err = anyhow::anyhow!("bad config");
        assert_eq!(step_exit_code(&err), None);
    }
}
