//! Wire codec for the line-oriented gateway protocol.
//!
//! One command per line, fields separated by `;`. Values are written as a
//! kind tag immediately followed by their literal, references as
//! `java.objecthashcode<N>`, and vector fields join their items with `,`.
//!
//! ```text
//! create;demo.Accumulator;numeric2.0;numeric3.0
//! method;java.objecthashcode1,java.objecthashcode2;add;numeric1.5
//! sync;java.objecthashcode1
//! close
//! ```

use crate::{GatewayError, Result};
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const REFERENCE_PREFIX: &str = "java.objecthashcode";

const TAG_INTEGER: &str = "integer";
const TAG_NUMERIC: &str = "numeric";
const TAG_CHARACTER: &str = "character";
const TAG_LOGICAL: &str = "logical";

const CMD_CREATE: &str = "create";
const CMD_METHOD: &str = "method";
const CMD_SYNC: &str = "sync";
const CMD_CLOSE: &str = "close";

const FIELD_SEPARATOR: char = ';';
const VECTOR_SEPARATOR: char = ',';

pub const REPLY_ACCEPTED: &str = "ACCEPTED";
pub const REPLY_BUSY: &str = "BUSY";
pub const REPLY_CLOSING: &str = "CLOSING";
pub const REPLY_ACK: &str = "REQUEST_RECEIVED_AND_PROCESSED";
const REPLY_FAULT: &str = "FAULT";

/// Token identifying a registered server-side object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectReference(u64);

impl ObjectReference {
    pub fn new(handle: u64) -> Self {
        Self(handle)
    }

    pub fn handle(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", REFERENCE_PREFIX, self.0)
    }
}

impl FromStr for ObjectReference {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix(REFERENCE_PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .map(ObjectReference)
            .ok_or_else(|| GatewayError::malformed(format!("not an object reference: {:?}", s)))
    }
}

/// A value as exchanged on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Integer(i32),
    Float(f64),
    Text(String),
    Boolean(bool),
    Reference(ObjectReference),
}

impl WireValue {
    /// Encode as `<tag><literal>` or a reference token.
    pub fn encode(&self) -> String {
        match self {
            WireValue::Integer(v) => format!("{}{}", TAG_INTEGER, v),
            WireValue::Float(v) => format!("{}{}", TAG_NUMERIC, v),
            WireValue::Text(v) => format!("{}{}", TAG_CHARACTER, escape_text(v)),
            WireValue::Boolean(v) => format!("{}{}", TAG_LOGICAL, v),
            WireValue::Reference(r) => r.to_string(),
        }
    }

    /// Decode a single tagged token.
    pub fn decode(token: &str) -> Result<Self> {
        if token.starts_with(REFERENCE_PREFIX) {
            return token.parse().map(WireValue::Reference);
        }
        if let Some(literal) = token.strip_prefix(TAG_INTEGER) {
            return literal
                .trim()
                .parse()
                .map(WireValue::Integer)
                .map_err(|e| GatewayError::malformed(format!("bad integer {:?}: {}", literal, e)));
        }
        if let Some(literal) = token.strip_prefix(TAG_NUMERIC) {
            return literal
                .trim()
                .parse()
                .map(WireValue::Float)
                .map_err(|e| GatewayError::malformed(format!("bad numeric {:?}: {}", literal, e)));
        }
        if let Some(literal) = token.strip_prefix(TAG_LOGICAL) {
            return match literal.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(WireValue::Boolean(true)),
                "false" => Ok(WireValue::Boolean(false)),
                _ => Err(GatewayError::malformed(format!(
                    "bad logical {:?}",
                    literal
                ))),
            };
        }
        if let Some(literal) = token.strip_prefix(TAG_CHARACTER) {
            return Ok(WireValue::Text(unescape_text(literal)));
        }
        Err(GatewayError::malformed(format!(
            "unknown value tag in {:?}",
            token
        )))
    }

    pub fn as_reference(&self) -> Option<ObjectReference> {
        match self {
            WireValue::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

/// Escape `\\`, `\n` and `\r` so a text value stays on one line.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Inverse of [`escape_text`]. Unknown escapes are kept as written.
fn unescape_text(literal: &str) -> String {
    let mut text = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => text.push('\\'),
            Some('n') => text.push('\n'),
            Some('r') => text.push('\r'),
            Some(other) => {
                text.push('\\');
                text.push(other);
            }
            None => text.push('\\'),
        }
    }
    text
}

fn is_tagged(piece: &str) -> bool {
    [
        REFERENCE_PREFIX,
        TAG_INTEGER,
        TAG_NUMERIC,
        TAG_CHARACTER,
        TAG_LOGICAL,
    ]
    .iter()
    .any(|tag| piece.starts_with(tag))
}

/// Split a vector field on `,`.
///
/// A piece that does not start with a value tag belongs to the previous item,
/// so `characterhello, world` stays one text value.
pub fn split_vector(field: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for piece in field.split(VECTOR_SEPARATOR) {
        match items.last_mut() {
            Some(last) if !is_tagged(piece) => {
                last.push(VECTOR_SEPARATOR);
                last.push_str(piece);
            }
            _ => items.push(piece.to_string()),
        }
    }
    items
}

/// Decode a possibly comma-separated field into its values.
pub fn decode_vector(field: &str) -> Result<Vec<WireValue>> {
    if field.is_empty() {
        return Err(GatewayError::malformed("empty value field"));
    }
    split_vector(field)
        .iter()
        .map(|item| WireValue::decode(item))
        .collect()
}

pub fn encode_vector(values: &[WireValue]) -> String {
    values
        .iter()
        .map(WireValue::encode)
        .collect::<Vec<_>>()
        .join(",")
}

/// Receiver of a `method` command.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// One or more registered objects.
    References(Vec<ObjectReference>),
    /// A type name, for static methods.
    Type(String),
}

/// A decoded command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Create {
        type_name: String,
        args: Vec<Vec<WireValue>>,
    },
    Invoke {
        target: Target,
        method: String,
        args: Vec<Vec<WireValue>>,
    },
    Reconcile(Vec<ObjectReference>),
    Close,
}

impl Request {
    /// Parse one protocol line (without its terminator).
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == CMD_CLOSE {
            return Ok(Request::Close);
        }

        let mut fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }

        match fields[0] {
            CMD_CREATE => {
                let type_name = required_field(&fields, 1, "type name")?;
                Ok(Request::Create {
                    type_name: type_name.to_string(),
                    args: decode_args(&fields[2..])?,
                })
            }
            CMD_METHOD => {
                let target = required_field(&fields, 1, "target")?;
                let method = required_field(&fields, 2, "method name")?;
                let target = if target.starts_with(REFERENCE_PREFIX) {
                    Target::References(parse_references(&[target])?)
                } else {
                    Target::Type(target.to_string())
                };
                Ok(Request::Invoke {
                    target,
                    method: method.to_string(),
                    args: decode_args(&fields[3..])?,
                })
            }
            CMD_SYNC => Ok(Request::Reconcile(parse_references(&fields[1..])?)),
            other => Err(GatewayError::malformed(format!(
                "unknown command {:?}",
                other
            ))),
        }
    }

    /// Encode as one protocol line (without terminator).
    pub fn encode(&self) -> String {
        match self {
            Request::Create { type_name, args } => {
                let mut line = format!("{};{}", CMD_CREATE, type_name);
                push_args(&mut line, args);
                line
            }
            Request::Invoke {
                target,
                method,
                args,
            } => {
                let target = match target {
                    Target::References(refs) => join_references(refs),
                    Target::Type(name) => name.clone(),
                };
                let mut line = format!("{};{};{}", CMD_METHOD, target, method);
                push_args(&mut line, args);
                line
            }
            Request::Reconcile(refs) => {
                let mut line = CMD_SYNC.to_string();
                for r in refs {
                    line.push(FIELD_SEPARATOR);
                    line.push_str(&r.to_string());
                }
                line
            }
            Request::Close => CMD_CLOSE.to_string(),
        }
    }
}

fn required_field<'a>(fields: &[&'a str], index: usize, what: &str) -> Result<&'a str> {
    match fields.get(index) {
        Some(f) if !f.is_empty() => Ok(f),
        _ => Err(GatewayError::malformed(format!("missing {}", what))),
    }
}

fn decode_args(fields: &[&str]) -> Result<Vec<Vec<WireValue>>> {
    fields.iter().map(|f| decode_vector(f)).collect()
}

fn parse_references(fields: &[&str]) -> Result<Vec<ObjectReference>> {
    fields
        .iter()
        .flat_map(|f| f.split(VECTOR_SEPARATOR))
        .filter(|piece| !piece.is_empty())
        .map(str::parse)
        .collect()
}

fn join_references(refs: &[ObjectReference]) -> String {
    refs.iter()
        .map(ObjectReference::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn push_args(line: &mut String, args: &[Vec<WireValue>]) {
    for arg in args {
        line.push(FIELD_SEPARATOR);
        line.push_str(&encode_vector(arg));
    }
}

/// Classification carried by a `FAULT` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    AdmissionRejected,
    ConnectionFailed,
    RequestTimeout,
    UnknownReference,
    UnknownType,
    NoMatchingMethod,
    AmbiguousVectorLengths,
    InvocationFault,
    MalformedRequest,
    Internal,
}

impl FaultKind {
    const ALL: [FaultKind; 10] = [
        FaultKind::AdmissionRejected,
        FaultKind::ConnectionFailed,
        FaultKind::RequestTimeout,
        FaultKind::UnknownReference,
        FaultKind::UnknownType,
        FaultKind::NoMatchingMethod,
        FaultKind::AmbiguousVectorLengths,
        FaultKind::InvocationFault,
        FaultKind::MalformedRequest,
        FaultKind::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::AdmissionRejected => "AdmissionRejected",
            FaultKind::ConnectionFailed => "ConnectionFailed",
            FaultKind::RequestTimeout => "RequestTimeout",
            FaultKind::UnknownReference => "UnknownReference",
            FaultKind::UnknownType => "UnknownType",
            FaultKind::NoMatchingMethod => "NoMatchingMethod",
            FaultKind::AmbiguousVectorLengths => "AmbiguousVectorLengths",
            FaultKind::InvocationFault => "InvocationFault",
            FaultKind::MalformedRequest => "MalformedRequest",
            FaultKind::Internal => "Internal",
        }
    }

}

impl FromStr for FaultKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GatewayError::MalformedReply {
                message: format!("unknown fault kind {:?}", s),
            })
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A server reply line.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Accepted,
    Busy,
    Closing,
    Ack,
    Value(WireValue),
    /// Result of a vectorized call; `None` marks a void iteration.
    Values(Vec<Option<WireValue>>),
    Fault { kind: FaultKind, message: String },
}

impl Reply {
    pub fn fault(err: &GatewayError) -> Self {
        Reply::Fault {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Collapse per-iteration results, unwrapping a single result.
    pub fn from_results(mut results: Vec<Option<WireValue>>) -> Self {
        if results.len() == 1 {
            return match results.pop().flatten() {
                Some(value) => Reply::Value(value),
                None => Reply::Ack,
            };
        }
        if results.iter().all(Option::is_none) {
            return Reply::Ack;
        }
        Reply::Values(results)
    }

    pub fn encode(&self) -> String {
        match self {
            Reply::Accepted => REPLY_ACCEPTED.to_string(),
            Reply::Busy => REPLY_BUSY.to_string(),
            Reply::Closing => REPLY_CLOSING.to_string(),
            Reply::Ack => REPLY_ACK.to_string(),
            Reply::Value(value) => value.encode(),
            Reply::Values(values) => values
                .iter()
                .map(|v| v.as_ref().map_or_else(|| REPLY_ACK.to_string(), WireValue::encode))
                .collect::<Vec<_>>()
                .join(","),
            Reply::Fault { kind, message } => format!(
                "{};{};{}",
                REPLY_FAULT,
                kind,
                message.replace(['\r', '\n'], " ")
            ),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let malformed = |message: String| GatewayError::MalformedReply { message };

        match line {
            REPLY_ACCEPTED => return Ok(Reply::Accepted),
            REPLY_BUSY => return Ok(Reply::Busy),
            REPLY_CLOSING => return Ok(Reply::Closing),
            REPLY_ACK => return Ok(Reply::Ack),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("FAULT;") {
            let (kind, message) = rest
                .split_once(FIELD_SEPARATOR)
                .ok_or_else(|| malformed(format!("fault without message: {:?}", line)))?;
            let kind = kind.parse::<FaultKind>()?;
            return Ok(Reply::Fault {
                kind,
                message: message.to_string(),
            });
        }

        if line.is_empty() {
            return Err(malformed("empty reply".to_string()));
        }
        let mut items = Vec::new();
        for piece in line.split(VECTOR_SEPARATOR) {
            if piece == REPLY_ACK {
                items.push(None);
                continue;
            }
            match items.last_mut() {
                Some(Some(WireValue::Text(text))) if !is_tagged(piece) => {
                    text.push(VECTOR_SEPARATOR);
                    text.push_str(&unescape_text(piece));
                }
                _ => items.push(Some(
                    WireValue::decode(piece).map_err(|e| malformed(e.to_string()))?,
                )),
            }
        }
        Ok(Reply::from_results(items))
    }

    /// Turn a fault reply into an error, passing everything else through.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Reply::Fault { kind, message } => Err(GatewayError::Remote { kind, message }),
            other => Ok(other),
        }
    }
}

/// Read one `\n`-terminated line of at most `limit` bytes.
///
/// Returns `None` on clean EOF (peer closed connection). A final line without
/// terminator is still returned.
pub async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && buf.len() > limit {
        return Err(GatewayError::LineTooLong { limit });
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| GatewayError::malformed("line is not valid UTF-8"))
}

/// Write one line followed by `\n` and flush.
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        for value in [
            WireValue::Integer(-17),
            WireValue::Float(3.5),
            WireValue::Float(0.1),
            WireValue::Text("spruce".to_string()),
            WireValue::Boolean(true),
            WireValue::Boolean(false),
        ] {
            assert_eq!(WireValue::decode(&value.encode()).unwrap(), value);
        }
    }

    #[test]
    fn test_decode_examples() {
        assert_eq!(
            WireValue::decode("numeric3.5").unwrap(),
            WireValue::Float(3.5)
        );
        assert_eq!(
            WireValue::decode("logicaltrue").unwrap(),
            WireValue::Boolean(true)
        );
        assert_eq!(
            WireValue::decode("logicalTRUE").unwrap(),
            WireValue::Boolean(true)
        );
        assert_eq!(
            WireValue::decode("integer42").unwrap(),
            WireValue::Integer(42)
        );
        assert_eq!(
            WireValue::decode("character").unwrap(),
            WireValue::Text(String::new())
        );
        assert_eq!(
            WireValue::decode("java.objecthashcode9").unwrap(),
            WireValue::Reference(ObjectReference::new(9))
        );
    }

    #[test]
    fn test_decode_rejects_bad_tokens() {
        assert!(WireValue::decode("numericabc").is_err());
        assert!(WireValue::decode("integer1.5").is_err());
        assert!(WireValue::decode("logicalmaybe").is_err());
        assert!(WireValue::decode("complex1+2i").is_err());
        assert!(WireValue::decode("java.objecthashcodeX").is_err());
    }

    #[test]
    fn test_text_with_commas_stays_whole() {
        assert_eq!(
            decode_vector("characterhello, world").unwrap(),
            vec![WireValue::Text("hello, world".to_string())]
        );
        assert_eq!(
            decode_vector("charactera,characterb").unwrap(),
            vec![
                WireValue::Text("a".to_string()),
                WireValue::Text("b".to_string())
            ]
        );
    }

    #[test]
    fn test_text_line_breaks_are_escaped() {
        let value = WireValue::Text("line1\nline2\r\\end".to_string());
        let encoded = value.encode();
        assert_eq!(encoded, "characterline1\\nline2\\r\\\\end");
        assert!(!encoded.contains(['\n', '\r']));
        assert_eq!(WireValue::decode(&encoded).unwrap(), value);

        let reply = Reply::Values(vec![
            Some(WireValue::Text("a,\nb".to_string())),
            Some(WireValue::Integer(1)),
        ]);
        assert_eq!(Reply::parse(&reply.encode()).unwrap(), reply);
    }

    #[test]
    fn test_unknown_escape_is_kept() {
        assert_eq!(
            WireValue::decode("characterC:\\tmp\\x\\").unwrap(),
            WireValue::Text("C:\\tmp\\x\\".to_string())
        );
    }

    #[test]
    fn test_fault_kind_from_str() {
        assert_eq!(
            "NoMatchingMethod".parse::<FaultKind>().unwrap(),
            FaultKind::NoMatchingMethod
        );
        for kind in FaultKind::ALL {
            assert_eq!(kind.as_str().parse::<FaultKind>().unwrap(), kind);
        }
        assert!(matches!(
            "Nonsense".parse::<FaultKind>(),
            Err(GatewayError::MalformedReply { .. })
        ));
    }

    #[test]
    fn test_parse_create() {
        let request = Request::parse("create;demo.Accumulator;numeric2.0;numeric3.0").unwrap();
        assert_eq!(
            request,
            Request::Create {
                type_name: "demo.Accumulator".to_string(),
                args: vec![vec![WireValue::Float(2.0)], vec![WireValue::Float(3.0)]],
            }
        );
    }

    #[test]
    fn test_parse_vectorized_invoke() {
        let request =
            Request::parse("method;java.objecthashcode1,java.objecthashcode2;add;numeric1.0,numeric2.0")
                .unwrap();
        assert_eq!(
            request,
            Request::Invoke {
                target: Target::References(vec![ObjectReference::new(1), ObjectReference::new(2)]),
                method: "add".to_string(),
                args: vec![vec![WireValue::Float(1.0), WireValue::Float(2.0)]],
            }
        );
    }

    #[test]
    fn test_parse_static_invoke() {
        let request = Request::parse("method;demo.Maths;hypot;numeric3;numeric4").unwrap();
        match request {
            Request::Invoke { target, .. } => {
                assert_eq!(target, Target::Type("demo.Maths".to_string()))
            }
            other => panic!("Expected Invoke, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sync_and_close() {
        assert_eq!(
            Request::parse("sync;java.objecthashcode3;java.objecthashcode5").unwrap(),
            Request::Reconcile(vec![ObjectReference::new(3), ObjectReference::new(5)])
        );
        assert_eq!(Request::parse("sync;").unwrap(), Request::Reconcile(vec![]));
        assert_eq!(Request::parse("sync").unwrap(), Request::Reconcile(vec![]));
        assert_eq!(Request::parse("close\r\n").unwrap(), Request::Close);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(Request::parse("").is_err());
        assert!(Request::parse("delete;x").is_err());
        assert!(Request::parse("create").is_err());
        assert!(Request::parse("method;java.objecthashcode1").is_err());
        assert!(Request::parse("create;demo.T;;numeric1").is_err());
        assert!(Request::parse("sync;characterx").is_err());
    }

    #[test]
    fn test_request_encode_matches_wire_form() {
        let request = Request::Invoke {
            target: Target::References(vec![ObjectReference::new(4)]),
            method: "add".to_string(),
            args: vec![vec![WireValue::Float(1.5)]],
        };
        assert_eq!(request.encode(), "method;java.objecthashcode4;add;numeric1.5");
        assert_eq!(Request::parse(&request.encode()).unwrap(), request);
    }

    #[test]
    fn test_reply_parse() {
        assert_eq!(Reply::parse("ACCEPTED").unwrap(), Reply::Accepted);
        assert_eq!(Reply::parse("BUSY").unwrap(), Reply::Busy);
        assert_eq!(
            Reply::parse("REQUEST_RECEIVED_AND_PROCESSED").unwrap(),
            Reply::Ack
        );
        assert_eq!(
            Reply::parse("numeric5.5").unwrap(),
            Reply::Value(WireValue::Float(5.5))
        );
        assert_eq!(
            Reply::parse("integer1,integer2").unwrap(),
            Reply::Values(vec![
                Some(WireValue::Integer(1)),
                Some(WireValue::Integer(2))
            ])
        );
        assert_eq!(
            Reply::parse("FAULT;UnknownReference;Unknown object reference: java.objecthashcode3")
                .unwrap(),
            Reply::Fault {
                kind: FaultKind::UnknownReference,
                message: "Unknown object reference: java.objecthashcode3".to_string(),
            }
        );
        assert!(Reply::parse("FAULT;Nonsense;x").is_err());
        assert!(Reply::parse("").is_err());
    }

    #[test]
    fn test_fault_message_is_single_line() {
        let reply = Reply::Fault {
            kind: FaultKind::InvocationFault,
            message: "first\nsecond".to_string(),
        };
        assert_eq!(reply.encode(), "FAULT;InvocationFault;first second");
    }

    #[test]
    fn test_from_results_unwraps_single_value() {
        assert_eq!(
            Reply::from_results(vec![Some(WireValue::Integer(1))]),
            Reply::Value(WireValue::Integer(1))
        );
        assert_eq!(Reply::from_results(vec![None, None]), Reply::Ack);
        assert_eq!(
            Reply::from_results(vec![Some(WireValue::Integer(1)), None]).encode(),
            "integer1,REQUEST_RECEIVED_AND_PROCESSED"
        );
    }

    #[tokio::test]
    async fn test_line_read_write() {
        let mut buf = Vec::new();
        write_line(&mut buf, "sync;java.objecthashcode1").await.unwrap();
        write_line(&mut buf, "close").await.unwrap();

        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(buf));
        assert_eq!(
            read_line(&mut reader, 1024).await.unwrap().as_deref(),
            Some("sync;java.objecthashcode1")
        );
        assert_eq!(
            read_line(&mut reader, 1024).await.unwrap().as_deref(),
            Some("close")
        );
        assert!(read_line(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(b"close\r\n".to_vec()));
        assert_eq!(
            read_line(&mut reader, 1024).await.unwrap().as_deref(),
            Some("close")
        );
    }

    #[tokio::test]
    async fn test_read_line_oversized_returns_error() {
        let mut reader =
            tokio::io::BufReader::new(std::io::Cursor::new(vec![b'a'; 64]));
        let result = read_line(&mut reader, 16).await;
        assert!(matches!(result, Err(GatewayError::LineTooLong { limit: 16 })));
    }

    #[tokio::test]
    async fn test_read_line_invalid_utf8_consumes_whole_line() {
        let mut reader = tokio::io::BufReader::new(std::io::Cursor::new(
            b"create;p.\xff\xfe\nclose\n".to_vec(),
        ));
        assert!(matches!(
            read_line(&mut reader, 1024).await,
            Err(GatewayError::MalformedRequest { .. })
        ));
        assert_eq!(
            read_line(&mut reader, 1024).await.unwrap().as_deref(),
            Some("close")
        );
    }
}
