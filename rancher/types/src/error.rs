use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "The following environment variables are required: {}",
        keys.join(", ")
    ))]
    MissingConfiguration { keys: Vec<String> },

    #[snafu(display("Invalid value '{}' for '{}': {}", value, key, reason))]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[snafu(display("Invalid number '{}' for '{}': {}", value, key, source))]
    InvalidNumber {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Unsupported OS specified '{}'!", os))]
    UnsupportedPlatform { os: String },

    #[snafu(display("Unable to read registration from '{}': {}", path, source))]
    RegistrationRead {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse registration in '{}': {}", path, source))]
    RegistrationParse {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to serialize registration: {}", source))]
    RegistrationSerialize { source: serde_json::Error },

    #[snafu(display("Unable to write registration to '{}': {}", path, source))]
    RegistrationWrite {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
