use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use dhcprelya_plugin::{PluginKind, PluginSpec};
use dhcprelya_proto::constants::{BOOTPS_PORT, DHCP_MIN_SIZE, DHCP_MTU_MAX};

use crate::cli::default_pid_path;
use crate::error::ConfigError;
use crate::model::{InterfaceSpec, Options, RelayConfig, ServerSpec};
use crate::resolve::{bounded, resolve_server};

const MAX_INCLUDE_DEPTH: usize = 4;

enum Section {
    None,
    Servers,
    Options,
    Plugin(String),
}

#[derive(Default)]
struct ParseState {
    interfaces: Vec<InterfaceSpec>,
    servers: Vec<ServerSpec>,
    bind_map: std::collections::HashMap<String, Ipv4Addr>,
    options: Options,
    // Preserves registration order, unlike a map keyed by name.
    plugin_lines: Vec<(String, Vec<String>)>,
}

/// Parse an INI-like file-driven config into a [`RelayConfig`].
/// `-d`/`-p` still come from the CLI even in file-driven mode, matching
/// the ISC tool's own precedence.
pub fn parse_config_file(
    path: &Path,
    foreground: bool,
    pid_file: Option<PathBuf>,
) -> Result<RelayConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;

    let mut state = ParseState::default();
    parse_sectioned(&text, &mut state, 0)?;

    drop_unreferenced_servers(&mut state);
    state.interfaces.retain(|iface| !iface.server_refs.is_empty());

    if state.interfaces.is_empty() {
        return Err(ConfigError::NoUsableInterfaces);
    }
    if state.servers.is_empty() {
        return Err(ConfigError::NoServers);
    }

    for iface in &mut state.interfaces {
        if let Some(ip) = state.bind_map.get(&iface.name) {
            iface.forced_ip = Some(*ip);
        }
    }

    let mut plugins = Vec::with_capacity(state.plugin_lines.len());
    for (name, lines) in state.plugin_lines {
        let kind = PluginKind::parse(&name).ok_or_else(|| ConfigError::UnknownPluginKind(name))?;
        plugins.push(PluginSpec { kind, options: lines });
    }

    Ok(RelayConfig {
        max_packet_size: state.options.max_packet_size,
        max_hops: state.options.max_hops,
        rps_limit: state.options.rps_limit,
        queue_capacity: state.options.queue_capacity,
        foreground,
        pid_path: pid_file.unwrap_or_else(default_pid_path),
        bpf_filter: None,
        interfaces: state.interfaces,
        servers: state.servers,
        plugins,
    })
}

/// A server line referencing zero interfaces never occurs syntactically
/// (the grammar requires at least one trailing interface token), but an
/// included `file=` list or a later interface removal can still leave a
/// server orphaned; such servers are dropped and every interface's
/// `server_refs` is remapped to the surviving indices.
fn drop_unreferenced_servers(state: &mut ParseState) {
    let mut keep = vec![false; state.servers.len()];
    for iface in &state.interfaces {
        for &idx in &iface.server_refs {
            keep[idx] = true;
        }
    }

    let mut remap = vec![None; state.servers.len()];
    let mut kept_servers = Vec::new();
    for (i, k) in keep.into_iter().enumerate() {
        if k {
            remap[i] = Some(kept_servers.len());
            kept_servers.push(state.servers[i].clone());
        }
    }

    for iface in &mut state.interfaces {
        iface.server_refs = iface
            .server_refs
            .iter()
            .filter_map(|idx| remap[*idx])
            .collect();
    }
    state.servers = kept_servers;
}

fn parse_sectioned(text: &str, state: &mut ParseState, depth: usize) -> Result<(), ConfigError> {
    let mut section = Section::None;

    for (i, raw_line) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let name = &line[1..line.len() - 1];
            section = if name.eq_ignore_ascii_case("servers") {
                Section::Servers
            } else if name.eq_ignore_ascii_case("options") {
                Section::Options
            } else if let Some(plugin_name) = name.strip_suffix("-plugin") {
                Section::Plugin(plugin_name.to_string())
            } else {
                return Err(syntax_err("top", lineno, format!("unknown section [{name}]")));
            };
            continue;
        }

        match &section {
            Section::None => {
                return Err(syntax_err("top", lineno, "line outside of any section"))
            }
            Section::Servers => parse_servers_line(line, state, lineno, depth)?,
            Section::Options => parse_options_line(line, state, lineno)?,
            Section::Plugin(name) => push_plugin_line(state, name, line),
        }
    }

    Ok(())
}

fn push_plugin_line(state: &mut ParseState, name: &str, line: &str) {
    match state.plugin_lines.iter_mut().find(|(n, _)| n == name) {
        Some((_, lines)) => lines.push(line.to_string()),
        None => state.plugin_lines.push((name.to_string(), vec![line.to_string()])),
    }
}

fn parse_servers_line(
    line: &str,
    state: &mut ParseState,
    lineno: usize,
    depth: usize,
) -> Result<(), ConfigError> {
    if let Some(rest) = line.strip_prefix("bind_ip=") {
        let mut parts = rest.split_whitespace();
        let ip_str = parts
            .next()
            .ok_or_else(|| syntax_err("servers", lineno, "bind_ip= requires an address"))?;
        let iface_name = parts
            .next()
            .ok_or_else(|| syntax_err("servers", lineno, "bind_ip= requires an interface name"))?;
        let ip: Ipv4Addr = ip_str
            .parse()
            .map_err(|_| syntax_err("servers", lineno, format!("invalid IPv4 address {ip_str:?}")))?;
        state.bind_map.insert(iface_name.to_string(), ip);
        return Ok(());
    }

    if let Some(rest) = line.strip_prefix("file=") {
        if depth + 1 > MAX_INCLUDE_DEPTH {
            return Err(ConfigError::IncludeTooDeep(depth + 1));
        }
        let included = std::fs::read_to_string(rest.trim())?;
        for (i, included_line) in included.lines().enumerate() {
            let included_line = included_line.trim();
            if included_line.is_empty() || included_line.starts_with('#') {
                continue;
            }
            parse_servers_line(included_line, state, i + 1, depth + 1)?;
        }
        return Ok(());
    }

    let mut tokens = line.split_whitespace();
    let endpoint = tokens
        .next()
        .ok_or_else(|| syntax_err("servers", lineno, "empty server line"))?;
    let iface_names: Vec<&str> = tokens.collect();
    if iface_names.is_empty() {
        return Err(syntax_err("servers", lineno, "server line names no interfaces"));
    }

    let addr = resolve_server(endpoint, BOOTPS_PORT)?;
    let server_idx = state.servers.len();
    state.servers.push(ServerSpec {
        name: endpoint.to_string(),
        addr,
    });

    for name in iface_names {
        let idx = get_or_create_interface(&mut state.interfaces, name);
        if !state.interfaces[idx].server_refs.contains(&server_idx) {
            state.interfaces[idx].server_refs.push(server_idx);
        }
    }

    Ok(())
}

/// Always resolves to the index owned by the interface's own name: a
/// repeated interface name extends the existing entry's `server_refs`
/// rather than creating a second `InterfaceSpec` for the same NIC.
pub(crate) fn get_or_create_interface(interfaces: &mut Vec<InterfaceSpec>, name: &str) -> usize {
    if let Some(idx) = interfaces.iter().position(|i| i.name == name) {
        return idx;
    }
    interfaces.push(InterfaceSpec {
        name: name.to_string(),
        forced_ip: None,
        server_refs: Vec::new(),
    });
    interfaces.len() - 1
}

fn parse_options_line(line: &str, state: &mut ParseState, lineno: usize) -> Result<(), ConfigError> {
    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| syntax_err("options", lineno, "expected key=value"))?;
    let key = key.trim();
    let value = value.trim();

    match key {
        "max_packet_size" => {
            let n: usize = value
                .parse()
                .map_err(|_| syntax_err("options", lineno, format!("invalid integer {value:?}")))?;
            bounded("max_packet_size", n as i64, DHCP_MIN_SIZE as i64, DHCP_MTU_MAX as i64)?;
            state.options.max_packet_size = n;
        }
        "max_hops" => {
            let n: u8 = value
                .parse()
                .map_err(|_| syntax_err("options", lineno, format!("invalid integer {value:?}")))?;
            bounded("max_hops", n as i64, 1, 16)?;
            state.options.max_hops = n;
        }
        "rps_limit" => {
            state.options.rps_limit = value
                .parse()
                .map_err(|_| syntax_err("options", lineno, format!("invalid integer {value:?}")))?;
        }
        "queue_capacity" => {
            state.options.queue_capacity = value
                .parse()
                .map_err(|_| syntax_err("options", lineno, format!("invalid integer {value:?}")))?;
        }
        "plugin_path" => {
            // Accepted for compatibility; plugins are resolved by name
            // against the static PluginKind table, not loaded from a path.
        }
        other => return Err(ConfigError::UnknownOption(other.to_string())),
    }

    Ok(())
}

fn syntax_err(section: &'static str, line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Syntax {
        section,
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_minimal_file() {
        let file = write_temp(
            "[servers]\n192.0.2.10:67 eth0\n\n[options]\nmax_packet_size=576\nmax_hops=4\n",
        );
        let cfg = parse_config_file(file.path(), false, None).unwrap();
        assert_eq!(cfg.interfaces.len(), 1);
        assert_eq!(cfg.interfaces[0].name, "eth0");
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.max_packet_size, 576);
        assert_eq!(cfg.max_hops, 4);
    }

    #[test]
    fn bind_ip_sets_forced_address() {
        let file = write_temp("[servers]\n192.0.2.10:67 eth0\nbind_ip=10.0.0.1 eth0\n");
        let cfg = parse_config_file(file.path(), false, None).unwrap();
        assert_eq!(cfg.interfaces[0].forced_ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn redeclared_interface_extends_server_refs() {
        let file = write_temp(
            "[servers]\n192.0.2.10:67 eth0\n192.0.2.11:67 eth0\n",
        );
        let cfg = parse_config_file(file.path(), false, None).unwrap();
        assert_eq!(cfg.interfaces.len(), 1);
        assert_eq!(cfg.interfaces[0].server_refs, vec![0, 1]);
    }

    #[test]
    fn plugin_section_collects_raw_lines() {
        let file = write_temp(
            "[servers]\n192.0.2.10:67 eth0\n\n[denylist-plugin]\naa:bb:cc:dd:ee:ff\n",
        );
        let cfg = parse_config_file(file.path(), false, None).unwrap();
        assert_eq!(cfg.plugins.len(), 1);
        assert_eq!(cfg.plugins[0].options, vec!["aa:bb:cc:dd:ee:ff".to_string()]);
    }

    #[test]
    fn unknown_plugin_kind_is_rejected() {
        let file = write_temp("[servers]\n192.0.2.10:67 eth0\n\n[nonexistent-plugin]\nx\n");
        assert!(matches!(
            parse_config_file(file.path(), false, None),
            Err(ConfigError::UnknownPluginKind(_))
        ));
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let file = write_temp("[servers]\n192.0.2.10:67 eth0\n\n[options]\nbogus=1\n");
        assert!(matches!(
            parse_config_file(file.path(), false, None),
            Err(ConfigError::UnknownOption(_))
        ));
    }
}
