//! Single-line text encoding of a [`DaemonContext`].
//!
//! ```text
//! Context[runtimeHome=<path>,userConfigDir=<path>,pid=<int|null>,idleTimeout=<ms>]
//! ```
//!
//! Path values escape the characters that would otherwise be ambiguous
//! (`%`, `,`, `[`, `]`, `=`, CR, LF) as `%XX` with uppercase hex, so any path
//! survives the trip; ordinary paths are written verbatim. The decoder
//! accepts exactly what [`encode`] produces and nothing else.

use super::context::DaemonContext;
use crate::error::{LodgeError, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

/// Literal written in place of an unknown process id.
pub const ABSENT_PID: &str = "null";

static CONTEXT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Context\[runtimeHome=((?:[^,\[\]=%\r\n]|%[0-9A-F]{2})*),userConfigDir=((?:[^,\[\]=%\r\n]|%[0-9A-F]{2})*),pid=(null|[0-9]+),idleTimeout=([0-9]+)\]$",
    )
    .expect("Invalid daemon context regex")
});

/// Encode a context as a single line.
pub fn encode(context: &DaemonContext) -> String {
    let pid = context
        .pid()
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| ABSENT_PID.to_string());

    format!(
        "Context[runtimeHome={},userConfigDir={},pid={},idleTimeout={}]",
        escape_path(context.runtime_home()),
        escape_path(context.user_config_dir()),
        pid,
        context.idle_timeout_ms()
    )
}

/// Decode a line produced by [`encode`].
///
/// # Returns
///
/// * `Err(LodgeError::MalformedContext)` - Shape, escaping or numbers do not match
pub fn decode(text: &str) -> Result<DaemonContext> {
    let captures = CONTEXT_REGEX
        .captures(text)
        .ok_or_else(|| LodgeError::malformed(text, "does not match the context format"))?;

    let runtime_home = unescape_path(text, "runtimeHome", &captures[1])?;
    let user_config_dir = unescape_path(text, "userConfigDir", &captures[2])?;

    let pid = match &captures[3] {
        ABSENT_PID => None,
        digits => Some(parse_number::<u32>(text, "pid", digits)?),
    };
    let idle_timeout_ms = parse_number::<u64>(text, "idleTimeout", &captures[4])?;

    Ok(DaemonContext::new(
        runtime_home,
        user_config_dir,
        pid,
        Duration::from_millis(idle_timeout_ms),
    ))
}

impl fmt::Display for DaemonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

impl FromStr for DaemonContext {
    type Err = LodgeError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

fn escape_path(path: &Path) -> String {
    escape(&path.to_string_lossy())
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' | ',' | '[' | ']' | '=' | '\r' | '\n' => {
                escaped.push_str(&format!("%{:02X}", c as u32));
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unescape_path(input: &str, field: &str, raw: &str) -> Result<PathBuf> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut rest = raw.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        if b == b'%' {
            // The pattern guarantees two hex digits follow.
            let hex = std::str::from_utf8(&tail[..2])
                .map_err(|_| LodgeError::malformed(input, format!("bad escape in {}", field)))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| LodgeError::malformed(input, format!("bad escape in {}", field)))?;
            bytes.push(byte);
            rest = &tail[2..];
        } else {
            bytes.push(b);
            rest = tail;
        }
    }

    let value = String::from_utf8(bytes)
        .map_err(|_| LodgeError::malformed(input, format!("{} is not valid UTF-8", field)))?;
    if escape(&value) != raw {
        return Err(LodgeError::malformed(
            input,
            format!("{} uses a non-canonical escape", field),
        ));
    }
    Ok(PathBuf::from(value))
}

fn parse_number<T: FromStr>(input: &str, field: &str, digits: &str) -> Result<T> {
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(LodgeError::malformed(
            input,
            format!("{} has leading zeros", field),
        ));
    }
    digits
        .parse::<T>()
        .map_err(|_| LodgeError::malformed(input, format!("{} is out of range", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EXAMPLE: &str =
        "Context[runtimeHome=/opt/jdk17,userConfigDir=/home/u/.cfg,pid=4821,idleTimeout=10800]";

    fn example() -> DaemonContext {
        DaemonContext::new(
            "/opt/jdk17",
            "/home/u/.cfg",
            Some(4821),
            Duration::from_millis(10_800),
        )
    }

    #[test]
    fn test_encode_matches_reference_line() {
        assert_eq!(encode(&example()), EXAMPLE);
        assert_eq!(example().to_string(), EXAMPLE);
    }

    #[test]
    fn test_reference_line_round_trips_and_matches_requirement() {
        let decoded = decode(EXAMPLE).unwrap();
        assert_eq!(decoded, example());
        assert_eq!(encode(&decoded), EXAMPLE);

        let requirement = DaemonContext::new(
            "/opt/jdk17",
            "/home/u/.cfg",
            None,
            Duration::from_secs(60),
        );
        assert!(decoded.is_compatible_with(&requirement));
    }

    #[test]
    fn test_absent_pid_is_null_literal() {
        let context = DaemonContext::new("/rt", "/cfg", None, Duration::from_millis(5));
        let text = encode(&context);
        assert_eq!(
            text,
            "Context[runtimeHome=/rt,userConfigDir=/cfg,pid=null,idleTimeout=5]"
        );
        assert_eq!(decode(&text).unwrap().pid(), None);
    }

    #[test]
    fn test_paths_with_delimiters_round_trip() {
        let context = DaemonContext::new(
            "/opt/jdk,17 [beta]=x%y",
            "/home/u/odd\nname",
            Some(1),
            Duration::from_millis(1),
        );
        let text = encode(&context);
        assert!(!text.contains('\n'));
        assert!(text.starts_with("Context[runtimeHome=/opt/jdk%2C17 %5Bbeta%5D%3Dx%25y,"));
        assert_eq!(decode(&text).unwrap(), context);
    }

    #[test]
    fn test_from_str_uses_decoder() {
        let parsed: DaemonContext = EXAMPLE.parse().unwrap();
        assert_eq!(parsed, example());
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let cases = [
            "",
            "garbage",
            "DefaultDaemonContext[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=1]",
            "Context[userConfigDir=/b,runtimeHome=/a,pid=1,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=abc,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=-1,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=2.5]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=2] trailing",
            " Context[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=2]",
            "Context[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=2]\n",
            "Context[runtimeHome=/a,b,userConfigDir=/b,pid=1,idleTimeout=2]",
        ];
        for case in cases {
            let result = decode(case);
            assert!(
                matches!(result, Err(LodgeError::MalformedContext { .. })),
                "expected MalformedContext for {:?}, got {:?}",
                case,
                result
            );
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range_numbers() {
        let pid_overflow =
            "Context[runtimeHome=/a,userConfigDir=/b,pid=4294967296,idleTimeout=2]";
        let err = decode(pid_overflow).unwrap_err();
        assert!(err.to_string().contains("pid is out of range"));

        let idle_overflow =
            "Context[runtimeHome=/a,userConfigDir=/b,pid=1,idleTimeout=18446744073709551616]";
        let err = decode(idle_overflow).unwrap_err();
        assert!(err.to_string().contains("idleTimeout is out of range"));
    }

    #[test]
    fn test_decode_rejects_non_canonical_forms() {
        // `/` is never escaped by the encoder.
        let escaped_slash = "Context[runtimeHome=%2Fa,userConfigDir=/b,pid=1,idleTimeout=2]";
        assert!(decode(escaped_slash).is_err());

        // Lowercase hex is never produced.
        let lowercase = "Context[runtimeHome=/a%2c,userConfigDir=/b,pid=1,idleTimeout=2]";
        assert!(decode(lowercase).is_err());

        let leading_zero = "Context[runtimeHome=/a,userConfigDir=/b,pid=01,idleTimeout=2]";
        assert!(decode(leading_zero).unwrap_err().to_string().contains("leading zeros"));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            runtime_home in "\\PC*",
            user_config_dir in "[ -~\n\r]*",
            pid in proptest::option::of(any::<u32>()),
            idle_ms in any::<u64>(),
        ) {
            let context = DaemonContext::new(
                runtime_home,
                user_config_dir,
                pid,
                Duration::from_millis(idle_ms),
            );
            let text = encode(&context);
            prop_assert!(!text.contains('\n'));
            prop_assert_eq!(decode(&text).unwrap(), context);
        }
    }
}
