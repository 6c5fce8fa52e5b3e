//!A mod for the error types
use std::fmt::{Debug, Display};

///Error building a module from its configuration.
pub enum BuildError {
    Message(String),
    Messages(Vec<String>),
}

impl BuildError {
    pub fn from_string(msg: String) -> Self {
        BuildError::Message(msg)
    }
    pub fn from_errs(errs: Vec<BuildError>) -> Self {
        let mut messages = Vec::with_capacity(errs.len());
        for err in errs {
            match err {
                Self::Message(msg) => messages.push(msg),
                Self::Messages(mut msgs) => messages.append(&mut msgs),
            }
        }
        Self::Messages(messages)
    }
}

impl Debug for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => f.write_fmt(format_args!("BuildError: {}", message)),
            Self::Messages(messages) => f.write_fmt(format_args!(
                "BuildError (multiple): \n{}",
                messages.join("\n")
            )),
        }
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Messages(messages) => f.write_str(&messages.join("; ")),
        }
    }
}

impl std::error::Error for BuildError {}

impl<E: Debug> From<pwmc_core::Error<E>> for BuildError {
    fn from(err: pwmc_core::Error<E>) -> BuildError {
        BuildError::from_string(format!("Could not configure PCA9685 device: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errs_flattens() {
        let err = BuildError::from_errs(vec![
            BuildError::from_string("a".to_string()),
            BuildError::Messages(vec!["b".to_string(), "c".to_string()]),
        ]);
        match err {
            BuildError::Messages(msgs) => assert_eq!(msgs, vec!["a", "b", "c"]),
            BuildError::Message(_) => panic!("expected multiple messages"),
        }
    }

    #[test]
    fn test_from_driver_error() {
        let err: BuildError = pwmc_core::Error::<()>::InvalidChannel(20).into();
        assert_eq!(
            err.to_string(),
            "Could not configure PCA9685 device: invalid channel 20, the PCA9685 has channels 0 to 15"
        );
    }
}
