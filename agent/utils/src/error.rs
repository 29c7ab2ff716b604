use aws_sdk_ec2::error::DeleteKeyPairError;
use aws_sdk_ec2::types::SdkError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(clippy::large_enum_variant)]
pub enum Error {
    #[snafu(display("Unable to start the AWS runtime: {}", source))]
    AwsRuntime { source: std::io::Error },

    #[snafu(display("Failed to start '{}': {}", hint, source))]
    CommandStart {
        hint: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "Error running '{}', exit code {}\nstderr:\n{}\nstdout:\n{}",
        hint,
        code,
        stderr,
        stdout
    ))]
    CommandFailed {
        hint: String,
        code: i32,
        stderr: String,
        stdout: String,
    },

    #[snafu(display("Failed to delete AWS key pair '{}': {}", name, source))]
    DeleteKeyPair {
        name: String,
        source: SdkError<DeleteKeyPairError>,
    },
}

impl Error {
    /// A command that ran and failed may succeed when run again. A command that could not be
    /// started, or an AWS call that exhausted the SDK's own retries, will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CommandFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
