//! Create rewrite: write a new version and maintain the version windows.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TbvConfig;
use crate::error::TbvResult;
use crate::rewrite::unmatched;
use crate::types::{Cypher, FieldCall};

/// Variables the prelude binds and the spliced fragment must carry forward.
const CARRIED: &str = "_r, _prev, _next_from";

/// Start of a `WITH` projection list.
static WITH_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bWITH\s+(?:DISTINCT\s+)?").unwrap());

/// Keywords that end a projection list.
const CLAUSE_KEYWORDS: &[&str] = &[
    "CALL", "CREATE", "DELETE", "DETACH", "FOREACH", "LIMIT", "MATCH", "MERGE", "OPTIONAL",
    "ORDER", "REMOVE", "RETURN", "SET", "SKIP", "UNION", "UNWIND", "WHERE", "WITH",
];

/// Wraps the compiler's node construction in resource upsert and window
/// maintenance.
///
/// The emitted statement, in order: merges the resource by `id`; deletes an
/// instance already written at the same instant along with its embedded
/// nodes; binds the version enclosing the instant (`_prev`) and the earliest
/// later version start (`_next_from`); runs the compiler's construction;
/// links the new instance with window `[instant, coalesce(_prev.to,
/// _next_from))`; closes `_prev` at the instant; returns as the compiler did.
#[derive(Debug, Clone)]
pub struct CreateRewrite {
    type_name: String,
}

impl CreateRewrite {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn apply(&self, call: &FieldCall, cypher: Cypher, config: &TbvConfig) -> TbvResult<Cypher> {
        let key = call.result_key();
        let terminal = format!("WITH {} RETURN", key);
        let Some(split) = cypher.query.rfind(&terminal) else {
            unmatched(config, &call.field, &terminal)?;
            return Ok(cypher);
        };
        let (construction, suffix) = cypher.query.split_at(split);
        let construction = carry_scope(construction.trim_end(), key);

        let labels = &config.labels;
        let version = &config.version_param;
        let edge = &labels.version_edge;

        let mut query = String::with_capacity(cypher.query.len() + 768);
        query.push_str(&format!(
            "MERGE (_r:{resource} {{id: $id}}) WITH _r\n",
            resource = labels.resource_labels(&self.type_name)
        ));
        query.push_str(&format!(
            "OPTIONAL MATCH (_r)<-[:{edge} {{from: ${version}}}]-(_stale)\n"
        ));
        query.push_str(&format!(
            "OPTIONAL MATCH (_stale)-[*]->(_embedded:{embedded})\n",
            embedded = labels.embedded
        ));
        query.push_str("DETACH DELETE _stale, _embedded WITH DISTINCT _r\n");
        query.push_str(&format!(
            "OPTIONAL MATCH (_r)<-[_v:{edge}]-() \
             WHERE _v.from <= ${version} AND coalesce(${version} < _v.to, true) \
             WITH _r, _v AS _prev\n"
        ));
        query.push_str(&format!(
            "OPTIONAL MATCH (_r)<-[_v:{edge}]-() WHERE _v.from > ${version} \
             WITH _r, _prev, min(_v.from) AS _next_from\n"
        ));
        query.push_str(&construction);
        query.push('\n');
        query.push_str(&format!("SET {key}:{instance}\n", instance = labels.instance));
        query.push_str(&format!(
            "CREATE (_r)<-[:{edge} {{from: ${version}, to: coalesce(_prev.to, _next_from)}}]-({key})\n"
        ));
        query.push_str(&format!("SET _prev.to = ${version}\n"));
        query.push_str(suffix);

        Ok(Cypher::with_params(query, cypher.params))
    }
}

/// Widen every `WITH` projection that passes `key` through unaliased, so the
/// prelude's variables stay in scope.
fn carry_scope(construction: &str, key: &str) -> String {
    let mut carried = String::with_capacity(construction.len() + 64);
    let mut copied = 0;

    for with in WITH_CLAUSE.find_iter(construction) {
        // `STARTS WITH` and `ENDS WITH` are string predicates.
        let before = construction[..with.start()].trim_end().to_ascii_uppercase();
        if before.ends_with("STARTS") || before.ends_with("ENDS") {
            continue;
        }

        let start = with.end();
        let items = construction[start..start + projection_len(&construction[start..])].trim_end();
        if split_items(items).iter().any(|item| item.trim() == key) {
            let end = start + items.len();
            carried.push_str(&construction[copied..end]);
            carried.push_str(", ");
            carried.push_str(CARRIED);
            copied = end;
        }
    }

    carried.push_str(&construction[copied..]);
    carried
}

/// Length of a projection list: up to the next top-level clause keyword.
fn projection_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                b'\'' | b'"' | b'`' => quote = Some(c),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                c if depth == 0 && is_word_start(bytes, i) && c.is_ascii_alphabetic() => {
                    let word_end = bytes[i..]
                        .iter()
                        .position(|b| !is_word_byte(*b))
                        .map_or(bytes.len(), |n| i + n);
                    let word = &text[i..word_end];
                    if CLAUSE_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                        return i;
                    }
                    i = word_end;
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
}

/// Split a projection list at top-level commas.
fn split_items(items: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in items.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&items[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&items[start..]);
    parts
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_word_start(bytes: &[u8], i: usize) -> bool {
    i == 0 || !(is_word_byte(bytes[i - 1]) || bytes[i - 1] == b'.' || bytes[i - 1] == b'$')
}
