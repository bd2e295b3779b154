//! Response decoding strategies for admin commands.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use regex::Regex;

use super::AdminError;

/// A decoded admin response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The peer closed without a body — the command simply succeeded.
    Done,
    /// The raw response buffer.
    Raw(String),
    /// Trimmed, non-empty response lines.
    Lines(Vec<String>),
    /// `key: value` lines collected into a map, values coerced to numbers
    /// where numeric.
    Fields(IndexMap<String, serde_json::Value>),
    /// Field-separated table rows, keyed by header column names.
    Table(Vec<IndexMap<String, String>>),
    /// A `<current> (initial <initial>)` weight pair.
    Weight { current: u32, initial: u32 },
}

/// How to decode a command's response.
#[derive(Clone, Default)]
pub enum Decoder {
    /// Detect the shape from the buffer (the default; see [`decode`]).
    #[default]
    Auto,
    /// Return the buffer as-is.
    Raw,
    /// Split into trimmed, non-empty lines.
    Lines,
    /// Parse `key: value` lines into a map.
    Fields,
    /// Parse the statistics table: strip the 2-character comment marker
    /// from the header, tokenize as CSV, drop the unnamed sentinel column.
    Table,
    /// Match the `<current> (initial <initial>)` weight pair.
    Weight,
    /// Caller-supplied transform over the raw buffer.
    Custom(Arc<dyn Fn(&str) -> Result<Reply, AdminError> + Send + Sync>),
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decoder::Auto => "Auto",
            Decoder::Raw => "Raw",
            Decoder::Lines => "Lines",
            Decoder::Fields => "Fields",
            Decoder::Table => "Table",
            Decoder::Weight => "Weight",
            Decoder::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

/// Decode `buffer` with the given strategy.
///
/// An empty buffer is a success ([`Reply::Done`]) no matter the strategy —
/// most mutating commands answer with silence. Under [`Decoder::Auto`], a
/// multi-line buffer decodes as fields, a single line containing `initial`
/// as a weight pair, and any other single line is the peer's error
/// convention, surfaced with the original command attached.
pub fn decode(decoder: &Decoder, buffer: &str, command: &str) -> Result<Reply, AdminError> {
    let buffer = buffer.trim();
    if buffer.is_empty() {
        return Ok(Reply::Done);
    }

    match decoder {
        Decoder::Auto => {
            if buffer.contains('\n') {
                Ok(fields(buffer))
            } else if buffer.contains("initial") {
                weight(buffer, command)
            } else {
                Err(AdminError::Protocol {
                    command: command.to_string(),
                    message: buffer.to_string(),
                })
            }
        }
        Decoder::Raw => Ok(Reply::Raw(buffer.to_string())),
        Decoder::Lines => Ok(Reply::Lines(
            buffer
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Decoder::Fields => Ok(fields(buffer)),
        Decoder::Table => table(buffer, command),
        Decoder::Weight => weight(buffer, command),
        Decoder::Custom(transform) => transform(buffer),
    }
}

fn fields(buffer: &str) -> Reply {
    let mut map = IndexMap::new();
    for line in buffer.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let coerced = match value.parse::<i64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => match value.parse::<f64>() {
                Ok(n) => serde_json::Value::from(n),
                Err(_) => serde_json::Value::from(value),
            },
        };
        map.insert(key.trim().to_string(), coerced);
    }
    Reply::Fields(map)
}

fn weight(buffer: &str, command: &str) -> Result<Reply, AdminError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(\d+)\s\(initial\s(\d+)\)").expect("static pattern compiles"));

    let captures = pattern
        .captures(buffer)
        .ok_or_else(|| AdminError::Decode {
            command: command.to_string(),
            reason: format!("{buffer:?} does not match the weight pair pattern"),
        })?;
    let number = |index| {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| AdminError::Decode {
                command: command.to_string(),
                reason: "weight out of range".to_string(),
            })
    };

    Ok(Reply::Weight {
        current: number(1)?,
        initial: number(2)?,
    })
}

fn table(buffer: &str, command: &str) -> Result<Reply, AdminError> {
    // The header line opens with a fixed 2-character comment marker.
    let body = buffer.get(2..).unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| AdminError::Decode {
            command: command.to_string(),
            reason: e.to_string(),
        })?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AdminError::Decode {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        let mut row = IndexMap::new();
        for (index, value) in record.iter().enumerate() {
            let name = headers.get(index).unwrap_or_default().trim();
            // Every data row ends with a field separator, producing one
            // column with no header name; drop that sentinel.
            if name.is_empty() {
                continue;
            }
            row.insert(name.to_string(), value.to_string());
        }
        rows.push(row);
    }

    Ok(Reply::Table(rows))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty_buffer_is_success_for_every_strategy() {
        for decoder in [
            Decoder::Auto,
            Decoder::Raw,
            Decoder::Lines,
            Decoder::Fields,
            Decoder::Table,
            Decoder::Weight,
        ] {
            let reply = decode(&decoder, "  \n ", "clear counters").unwrap();
            assert_eq!(reply, Reply::Done, "{decoder:?}");
        }
    }

    #[test]
    fn test_auto_multiline_decodes_as_fields() {
        let reply = decode(
            &Decoder::Auto,
            "Name: haproxy\nVersion: 1.5\nUptime_sec: 45\nnon matching line\n",
            "show info",
        )
        .unwrap();
        let Reply::Fields(map) = reply else {
            panic!("expected fields, got {reply:?}");
        };
        assert_eq!(map.get("Name"), Some(&serde_json::Value::from("haproxy")));
        assert_eq!(map.get("Version"), Some(&serde_json::Value::from(1.5)));
        assert_eq!(map.get("Uptime_sec"), Some(&serde_json::Value::from(45)));
        assert_eq!(map.len(), 3, "non-matching lines are dropped");
    }

    #[test]
    fn test_auto_single_line_with_initial_is_a_weight_pair() {
        let reply = decode(&Decoder::Auto, "5 (initial 1)", "get weight be/srv").unwrap();
        assert_eq!(
            reply,
            Reply::Weight {
                current: 5,
                initial: 1
            }
        );
    }

    #[test]
    fn test_auto_single_line_is_the_peer_error_convention() {
        let err = decode(
            &Decoder::Auto,
            "No such backend.",
            "disable server be/missing",
        )
        .unwrap_err();
        match err {
            AdminError::Protocol { command, message } => {
                assert_eq!(command, "disable server be/missing");
                assert_eq!(message, "No such backend.");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_weight_pair_fails_to_decode() {
        let err = decode(&Decoder::Weight, "garbage", "get weight be/srv").unwrap_err();
        assert!(matches!(err, AdminError::Decode { .. }));
    }

    #[test]
    fn test_lines_are_trimmed_and_non_empty() {
        let reply = decode(&Decoder::Lines, "  one \n\n two\n", "show acl").unwrap();
        assert_eq!(
            reply,
            Reply::Lines(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn test_raw_returns_buffer_as_is() {
        let reply = decode(&Decoder::Raw, "anything goes", "show errors").unwrap();
        assert_eq!(reply, Reply::Raw("anything goes".to_string()));
    }

    #[test]
    fn test_table_strips_marker_and_sentinel_column() {
        let buffer = "# pxname,svname,scur,\nwww,FRONTEND,3,\napi,app1,1,\n";
        let reply = decode(&Decoder::Table, buffer, "show stat -1 -1 -1").unwrap();
        let Reply::Table(rows) = reply else {
            panic!("expected table");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("pxname").map(String::as_str), Some("www"));
        assert_eq!(rows[0].get("scur").map(String::as_str), Some("3"));
        assert_eq!(rows[0].len(), 3, "sentinel column is dropped");
        assert_eq!(rows[1].get("svname").map(String::as_str), Some("app1"));
    }

    #[test]
    fn test_custom_transform_sees_the_raw_buffer() {
        let decoder = Decoder::Custom(Arc::new(|buffer: &str| {
            Ok(Reply::Raw(buffer.to_uppercase()))
        }));
        let reply = decode(&decoder, "mixed Case", "show info").unwrap();
        assert_eq!(reply, Reply::Raw("MIXED CASE".to_string()));
    }

    #[test]
    fn test_fields_value_whitespace_is_trimmed() {
        let reply = decode(&Decoder::Fields, "Name:   haproxy  \nPid: 12", "show info").unwrap();
        let Reply::Fields(map) = reply else {
            panic!("expected fields");
        };
        assert_eq!(map.get("Name"), Some(&serde_json::Value::from("haproxy")));
        assert_eq!(map.get("Pid"), Some(&serde_json::Value::from(12)));
    }
}
