//! AT command set understood by the radio firmware.
//!
//! Every command is written as one text line terminated by `\r\n`. Commands
//! that carry arguments append them in the exact quoting the firmware
//! expects, so the encoded form must not be reformatted.

use std::fmt;

/// Line terminator appended to every command.
pub const LINE_END: &[u8] = b"\r\n";

/// A single command line for the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `AT` - presence check.
    Attention,
    /// `AT+CWAUTOCONN=0` - stop the radio from rejoining on its own at boot.
    DisableAutoConnect,
    /// `AT+CWMODE_DEF=1` - station mode, persisted.
    StationMode,
    /// `AT+RST` - soft reset, answered by the `ready` banner.
    Reset,
    /// `AT+RESTORE` - factory restore, answered by the `ready` banner.
    Restore,
    /// `AT+CIPAPMAC?` - query the hardware address.
    QueryAddress,
    /// `AT+CIPSTATUS` - connection status query.
    Status,
    /// `AT+CWJAP_DEF="<ssid>","<password>"` - join a network.
    Join { ssid: &'a str, password: &'a str },
    /// `AT+CIPSTART="TCP","<host>",<port>` - open the TCP connection.
    Open { host: &'a str, port: u16 },
    /// `AT+CIPSEND=<len>` - announce the size of the next payload.
    SendSize(usize),
    /// `AT+CIPCLOSE` - close the TCP connection.
    Close,
    /// Arbitrary passthrough text, used for diagnostics.
    Raw(&'a str),
}

impl Command<'_> {
    /// Short name used in logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Attention => "AT",
            Self::DisableAutoConnect => "AT+CWAUTOCONN",
            Self::StationMode => "AT+CWMODE_DEF",
            Self::Reset => "AT+RST",
            Self::Restore => "AT+RESTORE",
            Self::QueryAddress => "AT+CIPAPMAC?",
            Self::Status => "AT+CIPSTATUS",
            Self::Join { .. } => "AT+CWJAP_DEF",
            Self::Open { .. } => "AT+CIPSTART",
            Self::SendSize(_) => "AT+CIPSEND",
            Self::Close => "AT+CIPCLOSE",
            Self::Raw(_) => "raw",
        }
    }

    /// Encode the command as the bytes written to the radio, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        line.extend_from_slice(LINE_END);
        line
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attention => f.write_str("AT"),
            Self::DisableAutoConnect => f.write_str("AT+CWAUTOCONN=0"),
            Self::StationMode => f.write_str("AT+CWMODE_DEF=1"),
            Self::Reset => f.write_str("AT+RST"),
            Self::Restore => f.write_str("AT+RESTORE"),
            Self::QueryAddress => f.write_str("AT+CIPAPMAC?"),
            Self::Status => f.write_str("AT+CIPSTATUS"),
            Self::Join { ssid, password } => {
                write!(f, "AT+CWJAP_DEF=\"{}\",\"{}\"", ssid, password)
            }
            Self::Open { host, port } => write!(f, "AT+CIPSTART=\"TCP\",\"{}\",{}", host, port),
            Self::SendSize(len) => write!(f, "AT+CIPSEND={}", len),
            Self::Close => f.write_str("AT+CIPCLOSE"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_commands() {
        assert_eq!(Command::Attention.encode(), b"AT\r\n".to_vec());
        assert_eq!(Command::Status.encode(), b"AT+CIPSTATUS\r\n".to_vec());
        assert_eq!(Command::Close.encode(), b"AT+CIPCLOSE\r\n".to_vec());
        assert_eq!(Command::StationMode.to_string(), "AT+CWMODE_DEF=1");
        assert_eq!(Command::DisableAutoConnect.to_string(), "AT+CWAUTOCONN=0");
    }

    #[test]
    fn test_join_quotes_credentials() {
        let cmd = Command::Join {
            ssid: "boathouse",
            password: "hunter2",
        };
        assert_eq!(cmd.encode(), b"AT+CWJAP_DEF=\"boathouse\",\"hunter2\"\r\n".to_vec());
    }

    #[test]
    fn test_open_and_send_size() {
        let open = Command::Open {
            host: "example.com",
            port: 80,
        };
        assert_eq!(open.to_string(), "AT+CIPSTART=\"TCP\",\"example.com\",80");
        assert_eq!(Command::SendSize(51).encode(), b"AT+CIPSEND=51\r\n".to_vec());
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(Command::Raw("AT+GMR").encode(), b"AT+GMR\r\n".to_vec());
        assert_eq!(Command::Raw("AT+GMR").name(), "raw");
    }
}
