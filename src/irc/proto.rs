//! IRC wire-format parsing
//!
//! Just enough of RFC 1459 to register, stay connected, and receive CTCP
//! `DCC SEND` offers: prefix/command/params message framing, CTCP delimiters,
//! and the DCC SEND argument list (filename, packed IPv4 address, port, size).

use std::net::Ipv4Addr;

/// Numeric reply: registration complete
pub(crate) const RPL_WELCOME: &str = "001";
/// Numeric reply: nickname already in use
pub(crate) const ERR_NICKNAMEINUSE: &str = "433";

/// A parsed IRC message
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Message {
    /// Origin prefix, without the leading `:`
    pub prefix: Option<String>,
    /// Command or three-digit numeric
    pub command: String,
    /// Parameters, trailing parameter included as the last entry
    pub params: Vec<String>,
}

/// Parse one IRC line (without its CRLF terminator)
pub(crate) fn parse_message(line: &str) -> Option<Message> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    if rest.is_empty() {
        return None;
    }

    let prefix = if let Some(after) = rest.strip_prefix(':') {
        let (prefix, tail) = after.split_once(' ')?;
        rest = tail;
        Some(prefix.to_string())
    } else {
        None
    };

    let mut params = Vec::new();
    let command = match rest.split_once(' ') {
        Some((command, tail)) => {
            rest = tail;
            let mut remaining = rest;
            loop {
                if let Some(trailing) = remaining.strip_prefix(':') {
                    params.push(trailing.to_string());
                    break;
                }
                match remaining.split_once(' ') {
                    Some((param, tail)) => {
                        if !param.is_empty() {
                            params.push(param.to_string());
                        }
                        remaining = tail;
                    }
                    None => {
                        if !remaining.is_empty() {
                            params.push(remaining.to_string());
                        }
                        break;
                    }
                }
            }
            command.to_string()
        }
        None => rest.to_string(),
    };

    if command.is_empty() {
        return None;
    }
    Some(Message {
        prefix,
        command,
        params,
    })
}

/// Nickname portion of a `nick!user@host` prefix
pub(crate) fn nick_of(prefix: &str) -> &str {
    prefix.split('!').next().unwrap_or(prefix)
}

/// Extract the payload of a CTCP-delimited message, if any
pub(crate) fn ctcp_payload(text: &str) -> Option<&str> {
    text.strip_prefix('\u{1}')?.strip_suffix('\u{1}')
}

/// A CTCP `DCC SEND` offer
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DccSendOffer {
    /// File name announced by the peer
    pub filename: String,
    /// Peer address to connect to
    pub address: Ipv4Addr,
    /// Peer port; zero signals reverse DCC
    pub port: u16,
    /// Announced size; None when absent or zero
    pub size: Option<u64>,
}

/// Parse the argument list of a `DCC SEND` CTCP payload
///
/// Accepts `DCC SEND <filename> <address> <port> [size]` where the filename
/// may be double-quoted to carry spaces and the address is either a packed
/// big-endian u32 or dotted-quad form.
pub(crate) fn parse_dcc_send(payload: &str) -> Option<DccSendOffer> {
    let rest = payload.strip_prefix("DCC ")?.trim_start();
    let rest = rest.strip_prefix("SEND ")?.trim_start();

    let (filename, rest) = if let Some(after) = rest.strip_prefix('"') {
        let end = after.find('"')?;
        (after[..end].to_string(), after[end + 1..].trim_start())
    } else {
        let (filename, tail) = rest.split_once(' ')?;
        (filename.to_string(), tail)
    };

    let mut fields = rest.split_ascii_whitespace();
    let address = parse_dcc_address(fields.next()?)?;
    let port: u16 = fields.next()?.parse().ok()?;
    let size = fields
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&s| s > 0);

    Some(DccSendOffer {
        filename,
        address,
        port,
        size,
    })
}

fn parse_dcc_address(field: &str) -> Option<Ipv4Addr> {
    if field.contains('.') {
        field.parse().ok()
    } else {
        field.parse::<u32>().ok().map(Ipv4Addr::from)
    }
}

/// Deterministic nickname alteration after a collision
pub(crate) fn alter_collided_nick(nickname: &str) -> String {
    format!("{nickname}^")
}
