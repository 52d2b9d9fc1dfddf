use serde::Deserialize;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ListenerError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty listener host")]
    EmptyHost,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ListenerError> {
        if self.host.is_empty() {
            return Err(ListenerError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ListenerError::InvalidPort);
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_defaults() {
        let listener: Listener = serde_yaml::from_str("port: 3000").unwrap();
        assert_eq!(listener.host, "0.0.0.0");
        assert_eq!(listener.addr(), "0.0.0.0:3000");

        let listener: Listener = serde_yaml::from_str("{}").unwrap();
        assert_eq!(listener, Listener::default());
        assert!(listener.validate().is_ok());
    }

    #[test]
    fn test_listener_validation() {
        let listener = Listener {
            host: "127.0.0.1".into(),
            port: 0,
        };
        assert_eq!(listener.validate(), Err(ListenerError::InvalidPort));

        let listener = Listener {
            host: "".into(),
            port: 80,
        };
        assert_eq!(listener.validate(), Err(ListenerError::EmptyHost));
    }
}
