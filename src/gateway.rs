//! Serial-line gateway adapter (§4.9), root only.
//!
//! Generic over `BufRead`/`Write` rather than bound to a concrete serial
//! port type, the way `control::config::ControlConfig::load` is generic
//! over `&Path` rather than a specific filesystem — it keeps the adapter
//! testable against an in-memory buffer (`std::io::Cursor`) and lets
//! `src/bin/node.rs` plug in whatever serial port crate the deployment
//! target needs without this module knowing about it.

use crate::node::NodeId;
use std::io::{self, BufRead, Write};

/// A command parsed from an inbound serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCommand {
    /// `"1/<nodeId>"`: open the valve at `dst_addr`.
    Open { dst_addr: NodeId },
}

/// Parse one serial line (without its trailing `\n`). Unknown command
/// lines are reported and ignored rather than rejected with an error, per
/// §4.9 ("Unknown command lines are reported to stderr-equivalent and
/// ignored").
pub fn parse_line(line: &str) -> Option<GatewayCommand> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut parts = line.splitn(2, '/');
    let tag = parts.next()?;
    let arg = parts.next()?;
    match tag {
        "1" => {
            let node_id: u16 = arg.parse().ok()?;
            Some(GatewayCommand::Open { dst_addr: NodeId(node_id) })
        }
        _ => {
            log::warn!("gateway: unrecognized command line {line:?}");
            None
        }
    }
}

/// Read one command from `reader`, returning `Ok(None)` at EOF. Blank lines
/// and lines that fail to parse are skipped, logged, and the next line is
/// attempted — `Ok(None)` is reserved for a genuine end of stream.
pub fn read_command(reader: &mut impl BufRead) -> io::Result<Option<GatewayCommand>> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some(cmd) = parse_line(&line) {
            return Ok(Some(cmd));
        }
        // parse_line already logged the diagnostic; keep reading.
    }
}

/// Write one `"0/<srcId>/<value>\n"` line for a DATA delivery.
pub fn write_data_event(writer: &mut impl Write, src_addr: NodeId, value: u16) -> io::Result<()> {
    writeln!(writer, "0/{}/{}", src_addr.0, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_open_command() {
        assert_eq!(parse_line("1/515"), Some(GatewayCommand::Open { dst_addr: NodeId(515) }));
    }

    #[test]
    fn unknown_command_is_ignored() {
        assert_eq!(parse_line("9/1"), None);
        assert_eq!(parse_line("garbage"), None);
    }

    #[test]
    fn read_command_skips_blank_and_bad_lines() {
        let mut input = Cursor::new(b"\n\ngarbage\n1/7\n".to_vec());
        let cmd = read_command(&mut input).unwrap();
        assert_eq!(cmd, Some(GatewayCommand::Open { dst_addr: NodeId(7) }));
        assert_eq!(read_command(&mut input).unwrap(), None);
    }

    #[test]
    fn writes_data_event_line() {
        let mut out = Vec::new();
        write_data_event(&mut out, NodeId(0x0203), 412).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0/515/412\n");
    }
}
