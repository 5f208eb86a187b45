use serde::{Deserialize, Serialize};
use std::fmt;

/// How the host talks to the helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// Describes how the host reaches the running helper.
///
/// Never mutated: a new start publishes a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerDefinition {
    Stdio {
        name: String,
        command: String,
        args: Vec<String>,
    },
    Http {
        name: String,
        url: String,
    },
}

impl ServerDefinition {
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        ServerDefinition::Stdio {
            name: name.into(),
            command: command.into(),
            args,
        }
    }

    /// HTTP definition for a helper listening on `localhost:<port>`
    pub fn http(name: impl Into<String>, port: u16) -> Self {
        ServerDefinition::Http {
            name: name.into(),
            url: format!("http://localhost:{port}"),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ServerDefinition::Stdio { name, .. } | ServerDefinition::Http { name, .. } => name,
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            ServerDefinition::Stdio { .. } => TransportKind::Stdio,
            ServerDefinition::Http { .. } => TransportKind::Http,
        }
    }

    /// Port of an HTTP definition
    pub fn port(&self) -> Option<u16> {
        match self {
            ServerDefinition::Http { url, .. } => url.rsplit(':').next()?.parse().ok(),
            ServerDefinition::Stdio { .. } => None,
        }
    }
}

impl fmt::Display for ServerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerDefinition::Stdio {
                name,
                command,
                args,
            } => write!(f, "{name} (stdio: {command} {})", args.join(" ")),
            ServerDefinition::Http { name, url } => write!(f, "{name} (http: {url})"),
        }
    }
}
