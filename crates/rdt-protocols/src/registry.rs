use rdt_abstract::{ConfigError, Protocol, SimConfig};

use crate::{ReceiverMachine, SenderMachine};

/// Sender and receiver for `config.protocol`.
pub fn builtin_pair(config: &SimConfig) -> (SenderMachine, ReceiverMachine) {
    (SenderMachine::new(config), ReceiverMachine::new(config))
}

/// Map a user-visible protocol name ("AB", "GBN" or "SR") to a sender and
/// receiver built from `config`. The name takes precedence over
/// `config.protocol`.
pub fn builtin_by_name(
    name: &str,
    config: &SimConfig,
) -> Result<(SenderMachine, ReceiverMachine), ConfigError> {
    let protocol: Protocol = name.parse()?;
    let config = SimConfig {
        protocol,
        ..config.clone()
    };
    Ok(builtin_pair(&config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_the_named_protocol() {
        let (sender, receiver) = builtin_by_name("SR", &SimConfig::default()).unwrap();
        assert_eq!(sender.protocol(), Protocol::SelectiveRepeat);
        assert!(matches!(receiver, ReceiverMachine::SelectiveRepeat(_)));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = builtin_by_name("sliding", &SimConfig::default()).err();
        assert_eq!(err, Some(ConfigError::UnknownProtocol("sliding".into())));
    }
}
