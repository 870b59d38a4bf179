use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::ConfigError;

/// Resolve a `host` or `host:port` server endpoint. DNS resolution
/// happens once, synchronously, at startup.
pub fn resolve_server(endpoint: &str, default_port: u16) -> Result<SocketAddr, ConfigError> {
    let (host, port) = match endpoint.rsplit_once(':') {
        Some((host, port_str)) => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| ConfigError::BadPort(endpoint.to_string()))?;
            (host, port)
        }
        None => (endpoint, default_port),
    };

    (host, port)
        .to_socket_addrs()
        .map_err(|err| ConfigError::UnresolvableHost(endpoint.to_string(), err))?
        .next()
        .ok_or_else(|| {
            ConfigError::UnresolvableHost(
                endpoint.to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
            )
        })
}

pub fn bounded(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfBounds {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_server_defaults_port() {
        let addr = resolve_server("127.0.0.1", 67).unwrap();
        assert_eq!(addr.port(), 67);
    }

    #[test]
    fn resolve_server_parses_explicit_port() {
        let addr = resolve_server("127.0.0.1:6700", 67).unwrap();
        assert_eq!(addr.port(), 6700);
    }

    #[test]
    fn resolve_server_rejects_bad_port() {
        assert!(matches!(
            resolve_server("127.0.0.1:notaport", 67),
            Err(ConfigError::BadPort(_))
        ));
    }

    #[test]
    fn bounded_rejects_out_of_range() {
        assert!(bounded("max_hops", 20, 1, 16).is_err());
        assert!(bounded("max_hops", 4, 1, 16).is_ok());
    }
}
