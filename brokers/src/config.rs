use std::{env, fmt};

use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};

use crate::error::{Error, Result};

pub const HOST_VAR: &str = "RABBITMQ_HOST";
pub const PORT_VAR: &str = "RABBITMQ_PORT";
pub const VHOST_VAR: &str = "RABBITMQ_VHOST";
pub const USERNAME_VAR: &str = "RABBITMQ_USERNAME";
pub const PASSWORD_VAR: &str = "RABBITMQ_PASSWORD";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5672;
const DEFAULT_VHOST: &str = "/conejo";
const DEFAULT_USERNAME: &str = "conejo";
const DEFAULT_PASSWORD: &str = "conejo";

/// Where and as whom to connect. Resolved once at startup and handed to
/// [`AmqpBroker::connect`](crate::amqp::AmqpBroker::connect).
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            vhost: DEFAULT_VHOST.into(),
            username: DEFAULT_USERNAME.into(),
            password: DEFAULT_PASSWORD.into(),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ConnectionParams {
    /// Reads the `RABBITMQ_*` variables from the process environment, falling back to the
    /// defaults for any that are unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup(PORT_VAR) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| Error::Config {
                var: PORT_VAR,
                reason: format!("{:?} is not a valid port ({})", raw, e),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: lookup(HOST_VAR).unwrap_or(defaults.host),
            port,
            vhost: lookup(VHOST_VAR).unwrap_or(defaults.vhost),
            username: lookup(USERNAME_VAR).unwrap_or(defaults.username),
            password: lookup(PASSWORD_VAR).unwrap_or(defaults.password),
        })
    }

    /// The vhost is carried as-is; lapin takes care of it on the wire, so `/conejo` needs no
    /// percent-encoding here.
    pub fn to_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..Default::default()
        }
    }
}
