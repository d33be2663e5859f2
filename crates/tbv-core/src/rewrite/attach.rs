//! Relation rewrite: attach associations at the resource level.

use regex::Regex;

use crate::config::TbvConfig;
use crate::error::TbvResult;
use crate::rewrite::{substitute, unmatched};
use crate::types::{Cypher, FieldCall, Params};

/// Prefix of the parameters carrying the ids to attach.
const TARGET_PARAM_PREFIX: &str = "to";

/// Redirects the target match of an `add*` mutation from the bare target
/// label to the target's resource labels.
///
/// When the call carries a `to*` parameter, the `{ id: $param }` equality of
/// the target match becomes `WHERE <target>.id IN $param` so a batch of ids
/// is bound in one statement.
#[derive(Debug, Clone)]
pub struct AttachRewrite {
    target_type: String,
    target_match: Regex,
    resource_match: Regex,
}

impl AttachRewrite {
    pub fn new(target_type: &str, config: &TbvConfig) -> TbvResult<Self> {
        let escaped = regex::escape(target_type);
        let target_match = Regex::new(&format!(
            r"MATCH \([^ :)]+:({}) \{{ [^ :)}}]+: \$[^ }})]+ \}}\)",
            escaped
        ))?;
        let resource_match = Regex::new(&format!(
            r"MATCH \(([^ :)]+):{}( \{{ [^ :)}}]+: \$[^ }})]+ \}}\))",
            regex::escape(&config.labels.resource_labels(target_type))
        ))?;
        Ok(Self {
            target_type: target_type.to_string(),
            target_match,
            resource_match,
        })
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn apply(&self, call: &FieldCall, cypher: Cypher, config: &TbvConfig) -> TbvResult<Cypher> {
        let resource = config.labels.resource_labels(&self.target_type);
        let Some(query) = substitute(
            config,
            &call.field,
            &self.target_match,
            &cypher.query,
            1,
            &resource,
        )?
        else {
            return Ok(cypher);
        };

        let Some(batch_param) = first_target_param(&cypher.params) else {
            return Ok(Cypher::with_params(query, cypher.params));
        };

        let Some(variable) = self
            .resource_match
            .captures(&query)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        else {
            unmatched(config, &call.field, self.resource_match.as_str())?;
            return Ok(Cypher::with_params(query, cypher.params));
        };

        let filter = format!(") WHERE {}.id IN ${}", variable, batch_param);
        let query = substitute(config, &call.field, &self.resource_match, &query, 2, &filter)?
            .unwrap_or(query);

        Ok(Cypher::with_params(query, cypher.params))
    }
}

/// First `to*` parameter in lexicographic order.
fn first_target_param(params: &Params) -> Option<&str> {
    params
        .keys()
        .map(String::as_str)
        .filter(|key| key.starts_with(TARGET_PARAM_PREFIX))
        .min()
}
