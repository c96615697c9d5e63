//! In-memory CouchDB double.
//!
//! Implements the slice of the HTTP API the document engine uses: document
//! CRUD with `_rev` checks, design-document creation, and view queries. Map
//! functions are evaluated by parsing the `if (...)` condition the engine
//! emits, so views filter exactly as the generated JavaScript would.

use crate::{
    engine::couchdb::transport::{DocumentTransport, HttpResponse, Method},
    error::InternalError,
};
use serde_json::{Map, Value as Json, json};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

const MAP_PREFIX: &str = "function(doc) { if (";
const MAP_SUFFIX: &str = ") { emit(doc._id, null); } }";

///
/// MemoryCouch
///

#[derive(Default)]
pub struct MemoryCouch {
    state: Mutex<CouchState>,
}

#[derive(Default)]
struct CouchState {
    docs: BTreeMap<String, Map<String, Json>>,
    designs: BTreeMap<String, Json>,
    design_creates: usize,
    requests: Vec<String>,
    next_id: u64,
}

impl MemoryCouch {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, CouchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document as if it had been written earlier.
    pub fn seed(&self, mut doc: Map<String, Json>) {
        let mut state = self.lock();
        let id = match doc.get("_id").and_then(Json::as_str) {
            Some(id) => id.to_string(),
            None => state.fresh_id(),
        };
        doc.insert("_id".into(), Json::from(id.as_str()));
        doc.insert("_rev".into(), Json::from(rev_token(1, &id)));
        state.docs.insert(id, doc);
    }

    /// Install a design document without counting it as a creation.
    pub fn install_design(&self, design: &Json) {
        let id = design
            .get("_id")
            .and_then(Json::as_str)
            .and_then(|id| id.strip_prefix("_design/"))
            .expect("design document id");
        self.lock().designs.insert(id.to_string(), design.clone());
    }

    pub fn design_creates(&self) -> usize {
        self.lock().design_creates
    }

    pub fn design_names(&self) -> Vec<String> {
        self.lock().designs.keys().cloned().collect()
    }

    pub fn document(&self, id: &str) -> Option<Map<String, Json>> {
        self.lock().docs.get(id).cloned()
    }

    /// `METHOD path` of every request so far.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }
}

impl DocumentTransport for MemoryCouch {
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Json>,
    ) -> Result<HttpResponse, InternalError> {
        let mut state = self.lock();
        state.requests.push(format!("{method} {path}"));

        let (route, query) = path.split_once('?').unwrap_or((path, ""));
        let segments: Vec<String> = route
            .trim_start_matches('/')
            .split('/')
            .map(decode_segment)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let response = match (method, segments.as_slice()) {
            (Method::Post, [""]) => state.post(body),
            (Method::Put, ["_design", name]) => state.put_design(name, body),
            (Method::Get, ["_design", name, "_view", view]) => state.query_view(name, view)?,
            (Method::Get, [id]) => state.get(id),
            (Method::Put, [id]) => state.put(id, body),
            (Method::Delete, [id]) => state.delete(id, query),
            _ => error(400, "bad_request", "unsupported route"),
        };

        Ok(response)
    }
}

// ----------------------------------------------------------------------
// Routes
// ----------------------------------------------------------------------

impl CouchState {
    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:032x}", self.next_id)
    }

    fn post(&mut self, body: Option<&Json>) -> HttpResponse {
        let Some(Json::Object(doc)) = body else {
            return error(400, "bad_request", "document must be an object");
        };
        let mut doc = doc.clone();
        let id = match doc.get("_id").and_then(Json::as_str) {
            Some(id) => id.to_string(),
            None => self.fresh_id(),
        };
        if self.docs.contains_key(&id) {
            return error(409, "conflict", "Document update conflict.");
        }

        let rev = rev_token(1, &id);
        doc.insert("_id".into(), Json::from(id.as_str()));
        doc.insert("_rev".into(), Json::from(rev.as_str()));
        self.docs.insert(id.clone(), doc);

        HttpResponse::new(201, json!({ "ok": true, "id": id, "rev": rev }))
    }

    fn get(&self, id: &str) -> HttpResponse {
        match self.docs.get(id) {
            Some(doc) => HttpResponse::new(200, Json::Object(doc.clone())),
            None => error(404, "not_found", "missing"),
        }
    }

    fn put(&mut self, id: &str, body: Option<&Json>) -> HttpResponse {
        let Some(Json::Object(doc)) = body else {
            return error(400, "bad_request", "document must be an object");
        };
        let presented = doc.get("_rev").and_then(Json::as_str);
        let stored = self
            .docs
            .get(id)
            .and_then(|doc| doc.get("_rev"))
            .and_then(Json::as_str);
        if presented != stored {
            return error(409, "conflict", "Document update conflict.");
        }

        let generation = stored.map_or(0, rev_generation) + 1;
        let rev = rev_token(generation, id);
        let mut doc = doc.clone();
        doc.insert("_id".into(), Json::from(id));
        doc.insert("_rev".into(), Json::from(rev.as_str()));
        self.docs.insert(id.to_string(), doc);

        HttpResponse::new(201, json!({ "ok": true, "id": id, "rev": rev }))
    }

    fn delete(&mut self, id: &str, query: &str) -> HttpResponse {
        let presented = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("rev="))
            .map(decode_segment);
        let Some(stored) = self.docs.get(id) else {
            return error(404, "not_found", "missing");
        };
        let stored = stored.get("_rev").and_then(Json::as_str).map(str::to_string);
        if presented != stored {
            return error(409, "conflict", "Document update conflict.");
        }

        self.docs.remove(id);
        HttpResponse::new(200, json!({ "ok": true, "id": id }))
    }

    fn put_design(&mut self, name: &str, body: Option<&Json>) -> HttpResponse {
        if self.designs.contains_key(name) {
            return error(409, "conflict", "Document update conflict.");
        }
        let Some(design) = body else {
            return error(400, "bad_request", "missing design document");
        };

        self.designs.insert(name.to_string(), design.clone());
        self.design_creates += 1;

        HttpResponse::new(
            201,
            json!({ "ok": true, "id": format!("_design/{name}"), "rev": "1-design" }),
        )
    }

    fn query_view(&self, name: &str, view: &str) -> Result<HttpResponse, InternalError> {
        let Some(map) = self
            .designs
            .get(name)
            .and_then(|design| design.pointer(&format!("/views/{view}/map")))
            .and_then(Json::as_str)
        else {
            return Ok(error(404, "not_found", "missing_named_view"));
        };

        let condition = map
            .strip_prefix(MAP_PREFIX)
            .and_then(|rest| rest.strip_suffix(MAP_SUFFIX))
            .ok_or_else(|| InternalError::engine(format!("unexpected map function: {map}")))?;
        let filter = Parser::parse(condition)?;

        let rows: Vec<Json> = self
            .docs
            .iter()
            .filter(|(_, doc)| filter.eval(doc))
            .map(|(id, doc)| json!({ "id": id, "key": id, "value": null, "doc": doc }))
            .collect();

        Ok(HttpResponse::new(
            200,
            json!({ "total_rows": self.docs.len(), "offset": 0, "rows": rows }),
        ))
    }
}

fn error(status: u16, error: &str, reason: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "error": error, "reason": reason }))
}

fn rev_token(generation: u64, id: &str) -> String {
    format!("{generation}-{}", id.len())
}

fn rev_generation(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn decode_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(byte) = segment
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

// ----------------------------------------------------------------------
// Map-condition evaluator
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Field(String),
    Literal(Json),
    Cmp(Cmp),
    And,
    Or,
    Open,
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Operand {
    Field(String),
    Literal(Json),
}

#[derive(Debug)]
enum Expr {
    Or(Vec<Self>),
    And(Vec<Self>),
    Compare(Operand, Cmp, Operand),
}

impl Expr {
    fn eval(&self, doc: &Map<String, Json>) -> bool {
        match self {
            Self::Or(terms) => terms.iter().any(|term| term.eval(doc)),
            Self::And(terms) => terms.iter().all(|term| term.eval(doc)),
            Self::Compare(left, cmp, right) => {
                compare(&resolve(left, doc), *cmp, &resolve(right, doc))
            }
        }
    }
}

fn resolve(operand: &Operand, doc: &Map<String, Json>) -> Json {
    match operand {
        Operand::Field(name) => doc.get(name).cloned().unwrap_or(Json::Null),
        Operand::Literal(value) => value.clone(),
    }
}

fn order(left: &Json, right: &Json) -> Option<Ordering> {
    match (left, right) {
        (Json::Number(a), Json::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        (Json::Null, Json::Null) => Some(Ordering::Equal),
        (Json::Bool(a), Json::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare(left: &Json, cmp: Cmp, right: &Json) -> bool {
    let ordering = order(left, right);

    match cmp {
        Cmp::Eq => ordering == Some(Ordering::Equal),
        Cmp::Ne => ordering != Some(Ordering::Equal),
        Cmp::Lt => ordering == Some(Ordering::Less),
        Cmp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Cmp::Gt => ordering == Some(Ordering::Greater),
        Cmp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn parse(condition: &str) -> Result<Expr, InternalError> {
        let mut parser = Self {
            tokens: tokenize(condition)?,
            position: 0,
        };
        let expr = parser.or()?;
        if parser.position != parser.tokens.len() {
            return Err(parse_error(condition));
        }

        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn or(&mut self) -> Result<Expr, InternalError> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            terms.push(self.and()?);
        }

        Ok(Expr::Or(terms))
    }

    fn and(&mut self) -> Result<Expr, InternalError> {
        let mut terms = vec![self.atom()?];
        while self.peek() == Some(&Token::And) {
            self.position += 1;
            terms.push(self.atom()?);
        }

        Ok(Expr::And(terms))
    }

    fn atom(&mut self) -> Result<Expr, InternalError> {
        if self.peek() == Some(&Token::Open) {
            self.position += 1;
            let inner = self.or()?;
            return match self.advance() {
                Some(Token::Close) => Ok(inner),
                _ => Err(InternalError::engine("unbalanced parenthesis in map condition")),
            };
        }

        let left = self.operand()?;
        let Some(Token::Cmp(cmp)) = self.advance() else {
            return Err(InternalError::engine("expected a comparison in map condition"));
        };
        let right = self.operand()?;

        Ok(Expr::Compare(left, cmp, right))
    }

    fn operand(&mut self) -> Result<Operand, InternalError> {
        match self.advance() {
            Some(Token::Field(name)) => Ok(Operand::Field(name)),
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            other => Err(InternalError::engine(format!(
                "expected an operand in map condition, found {other:?}"
            ))),
        }
    }
}

fn parse_error(condition: &str) -> InternalError {
    InternalError::engine(format!("cannot parse map condition: {condition}"))
}

fn tokenize(condition: &str) -> Result<Vec<Token>, InternalError> {
    let chars: Vec<char> = condition.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        let (token, width) = match (c, next) {
            (' ', _) => {
                i += 1;
                continue;
            }
            ('(', _) => (Token::Open, 1),
            (')', _) => (Token::Close, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('=', Some('=')) => (Token::Cmp(Cmp::Eq), 2),
            ('!', Some('=')) => (Token::Cmp(Cmp::Ne), 2),
            ('<', Some('=')) => (Token::Cmp(Cmp::Le), 2),
            ('>', Some('=')) => (Token::Cmp(Cmp::Ge), 2),
            ('<', _) => (Token::Cmp(Cmp::Lt), 1),
            ('>', _) => (Token::Cmp(Cmp::Gt), 1),
            ('"', _) => {
                let mut end = i + 1;
                while end < chars.len() && chars[end] != '"' {
                    end += if chars[end] == '\\' { 2 } else { 1 };
                }
                let text: String = chars[i..=end.min(chars.len() - 1)].iter().collect();
                let value = serde_json::from_str(&text).map_err(|_| parse_error(condition))?;
                (Token::Literal(value), end + 1 - i)
            }
            (c, _) if c == '-' || c.is_ascii_digit() => {
                let mut end = i + 1;
                while end < chars.len()
                    && (chars[end].is_ascii_digit() || matches!(chars[end], '.' | 'e' | 'E' | '+' | '-'))
                {
                    end += 1;
                }
                let text: String = chars[i..end].iter().collect();
                let value = serde_json::from_str(&text).map_err(|_| parse_error(condition))?;
                (Token::Literal(value), end - i)
            }
            (c, _) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut end = i + 1;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || matches!(chars[end], '_' | '$' | '.'))
                {
                    end += 1;
                }
                let word: String = chars[i..end].iter().collect();
                let token = match word.as_str() {
                    "null" => Token::Literal(Json::Null),
                    "true" => Token::Literal(Json::Bool(true)),
                    "false" => Token::Literal(Json::Bool(false)),
                    _ => match word.strip_prefix("doc.") {
                        Some(field) => Token::Field(field.to_string()),
                        None => return Err(parse_error(condition)),
                    },
                };
                (token, end - i)
            }
            _ => return Err(parse_error(condition)),
        };

        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: Json) -> Map<String, Json> {
        pairs.as_object().cloned().expect("object")
    }

    #[test]
    fn conditions_follow_precedence_and_nesting() {
        let filter = Parser::parse(
            r#"doc.type == "people" && (doc.people_age > 30 || doc.people_name == "a\"b")"#,
        )
        .expect("parse");

        assert!(filter.eval(&doc(json!({ "type": "people", "people_age": 31 }))));
        assert!(filter.eval(&doc(json!({ "type": "people", "people_name": "a\"b" }))));
        assert!(!filter.eval(&doc(json!({ "type": "people", "people_age": 30 }))));
        assert!(!filter.eval(&doc(json!({ "type": "pets", "people_age": 99 }))));
    }

    #[test]
    fn missing_members_compare_equal_to_null() {
        let filter = Parser::parse("doc.a_b == null && doc.a_c != null").expect("parse");

        assert!(filter.eval(&doc(json!({ "a_c": -1.5 }))));
        assert!(!filter.eval(&doc(json!({ "a_b": 0, "a_c": 1 }))));
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(Parser::parse("doc.a == ").is_err());
        assert!(Parser::parse("(doc.a == 1").is_err());
        assert!(Parser::parse("window.a == 1").is_err());
    }

    #[test]
    fn percent_escapes_are_decoded() {
        assert_eq!(decode_segment("a%2Fb%20c"), "a/b c");
        assert_eq!(decode_segment("100%"), "100%");
    }
}
