//! Query rewrite: resolve the instance valid at the version instant.

use regex::Regex;

use crate::config::TbvConfig;
use crate::error::TbvResult;
use crate::rewrite::substitute;
use crate::types::{Cypher, FieldCall};

/// Rewrites the compiler's root `MATCH (<key>:<Type>) WHERE` into a match
/// through the resource and its version edge, filtered on the edge window.
#[derive(Debug, Clone)]
pub struct ReadRewrite {
    type_name: String,
    field: String,
    where_clause: Regex,
    match_clause: Regex,
}

impl ReadRewrite {
    pub fn new(field: &str, type_name: &str) -> TbvResult<Self> {
        let (where_clause, match_clause) = patterns(field, type_name)?;
        Ok(Self {
            type_name: type_name.to_string(),
            field: field.to_string(),
            where_clause,
            match_clause,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn apply(&self, call: &FieldCall, cypher: Cypher, config: &TbvConfig) -> TbvResult<Cypher> {
        let key = call.result_key();
        let aliased;
        let (where_clause, match_clause) = if key == self.field {
            (&self.where_clause, &self.match_clause)
        } else {
            aliased = patterns(key, &self.type_name)?;
            (&aliased.0, &aliased.1)
        };

        let version = &config.version_param;
        let labels = &config.labels;
        let predicate = format!(
            " (_v.from <= ${version} AND coalesce(${version} < _v.to, true)) AND ",
            version = version
        );
        let traversal = format!(
            "(_r:{resource})<-[_v:{edge}]-({key}:{instance})",
            resource = labels.resource_labels(&self.type_name),
            edge = labels.version_edge,
            key = key,
            instance = labels.instance_labels(&self.type_name),
        );

        let Some(query) = substitute(config, &call.field, where_clause, &cypher.query, 1, &predicate)?
        else {
            return Ok(cypher);
        };
        let Some(query) = substitute(config, &call.field, match_clause, &query, 1, &traversal)? else {
            return Ok(cypher);
        };

        Ok(Cypher::with_params(query, cypher.params))
    }
}

fn patterns(key: &str, type_name: &str) -> TbvResult<(Regex, Regex)> {
    let key = regex::escape(key);
    let type_name = regex::escape(type_name);
    let where_clause = Regex::new(&format!(r"MATCH \({}:{}\) WHERE( )", key, type_name))?;
    let match_clause = Regex::new(&format!(r"MATCH (\({}:{}\)) WHERE", key, type_name))?;
    Ok((where_clause, match_clause))
}
