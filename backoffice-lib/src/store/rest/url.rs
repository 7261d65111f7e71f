//! Gateway query string generation.
//!
//! Renders [`Filter`] trees in the gateway's `column=operator.value`
//! dialect, with `or=(...)`/`and=(...)` groups for nested logic.

use crate::model::Value;
use crate::store::Direction;
use crate::store::Filter;
use crate::store::OrderBy;
use crate::store::Select;

/// Converts a filter into query parameters.
///
/// Top-level conjunctions become separate parameters; all logical groups
/// are folded into a single `or` or `and` parameter.
pub fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    let mut leaves = Vec::new();
    let mut groups = Vec::new();
    collect_conjuncts(filter, &mut leaves, &mut groups);

    let mut params: Vec<(String, String)> = leaves
        .into_iter()
        .filter_map(leaf_param)
        .collect();

    match groups.as_slice() {
        [] => {}
        [Filter::Or(children)] => {
            params.push(("or".to_string(), format!("({})", join_exprs(children))));
        }
        _ => {
            let exprs: Vec<String> = groups.iter().filter_map(|g| logic_expr(g)).collect();
            params.push(("and".to_string(), format!("({})", exprs.join(","))));
        }
    }
    params
}

/// Converts a full select into query parameters (filters, columns, order, paging).
pub fn select_params(select: &Select) -> Vec<(String, String)> {
    let columns = select
        .columns
        .as_ref()
        .map(|c| c.join(","))
        .unwrap_or_else(|| "*".to_string());
    let mut params = vec![("select".to_string(), columns)];

    if let Some(filter) = &select.filter {
        params.extend(filter_params(filter));
    }
    if let Some(order) = &select.order {
        params.push(("order".to_string(), order_to_param(order)));
    }
    if let (Some(offset), Some(limit)) = (select.offset(), select.limit()) {
        params.push(("offset".to_string(), offset.to_string()));
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Converts an `OrderBy` to the `order` parameter value.
pub fn order_to_param(order: &OrderBy) -> String {
    order
        .fields()
        .iter()
        .map(|(field, direction)| {
            let dir = match direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            format!("{}.{}", field, dir)
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn collect_conjuncts<'a>(filter: &'a Filter, leaves: &mut Vec<&'a Filter>, groups: &mut Vec<&'a Filter>) {
    match filter {
        Filter::And(children) => {
            for child in children {
                collect_conjuncts(child, leaves, groups);
            }
        }
        Filter::Or(children) if children.is_empty() => {}
        Filter::Or(_) => groups.push(filter),
        _ => leaves.push(filter),
    }
}

fn join_exprs(children: &[Filter]) -> String {
    children
        .iter()
        .filter_map(logic_expr)
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders a filter inside a logic group: `field.op.value`, `or(...)`, `and(...)`.
fn logic_expr(filter: &Filter) -> Option<String> {
    match filter {
        Filter::And(children) if children.is_empty() => None,
        Filter::Or(children) if children.is_empty() => None,
        Filter::And(children) => Some(format!("and({})", join_exprs(children))),
        Filter::Or(children) => Some(format!("or({})", join_exprs(children))),
        leaf => {
            let (field, op) = leaf_operator(leaf, true)?;
            Some(format!("{}.{}", field, op))
        }
    }
}

fn leaf_param(filter: &Filter) -> Option<(String, String)> {
    leaf_operator(filter, false).map(|(field, op)| (field.to_string(), op))
}

/// Returns the column and `operator.value` for a leaf filter.
///
/// Inside logic groups reserved characters force the value to be quoted.
fn leaf_operator(filter: &Filter, grouped: bool) -> Option<(&str, String)> {
    let render = |value: &Value| {
        let text = value_to_param(value);
        if grouped { quote_if_needed(&text) } else { text }
    };
    let rendered = match filter {
        Filter::Eq(field, value) => (field.as_str(), format!("eq.{}", render(value))),
        Filter::Neq(field, value) => (field.as_str(), format!("neq.{}", render(value))),
        Filter::Gt(field, value) => (field.as_str(), format!("gt.{}", render(value))),
        Filter::Gte(field, value) => (field.as_str(), format!("gte.{}", render(value))),
        Filter::Lt(field, value) => (field.as_str(), format!("lt.{}", render(value))),
        Filter::Lte(field, value) => (field.as_str(), format!("lte.{}", render(value))),
        Filter::ILike(field, needle) => {
            let pattern = format!("*{}*", escape_like(needle));
            let pattern = if grouped { quote_if_needed(&pattern) } else { pattern };
            (field.as_str(), format!("ilike.{}", pattern))
        }
        Filter::IsNull(field) => (field.as_str(), "is.null".to_string()),
        Filter::IsNotNull(field) => (field.as_str(), "not.is.null".to_string()),
        Filter::In(field, values) => {
            let items: Vec<String> = values
                .iter()
                .map(|v| quote_if_needed(&value_to_param(v)))
                .collect();
            (field.as_str(), format!("in.({})", items.join(",")))
        }
        Filter::And(_) | Filter::Or(_) => return None,
    };
    Some(rendered)
}

/// Converts a `Value` to its parameter text.
pub fn value_to_param(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(value_to_param).collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Map(_) => serde_json::to_string(value).unwrap_or_default(),
        scalar => scalar.as_text().unwrap_or_default(),
    }
}

/// Escapes LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        match ch {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn quote_if_needed(text: &str) -> String {
    const RESERVED: [char; 6] = [',', '.', ':', '(', ')', '"'];
    if !text.contains(RESERVED) && !text.contains(' ') {
        return text.to_string();
    }
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(filter: Filter) -> Vec<(String, String)> {
        filter_params(&filter)
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_simple_filters() {
        assert_eq!(params(Filter::eq("status", "open")), vec![pair("status", "eq.open")]);
        assert_eq!(params(Filter::gte("amount", 100i64)), vec![pair("amount", "gte.100")]);
        assert_eq!(params(Filter::is_null("resolved_at")), vec![pair("resolved_at", "is.null")]);
        assert_eq!(
            params(Filter::is_not_null("channel_id")),
            vec![pair("channel_id", "not.is.null")]
        );
    }

    #[test]
    fn test_ilike_escapes_wildcards() {
        assert_eq!(
            params(Filter::ilike("email", "50%_off*")),
            vec![pair("email", r"ilike.*50\%\_off*")]
        );
    }

    #[test]
    fn test_top_level_and_flattens() {
        let filter = Filter::and([Filter::eq("status", "open"), Filter::gt("amount", 10i64)]);
        assert_eq!(
            params(filter),
            vec![pair("status", "eq.open"), pair("amount", "gt.10")]
        );
    }

    #[test]
    fn test_single_or_group() {
        let filter = Filter::or([Filter::ilike("first_name", "jean"), Filter::ilike("email", "jean")]);
        assert_eq!(
            params(filter),
            vec![pair("or", "(first_name.ilike.*jean*,email.ilike.*jean*)")]
        );
    }

    #[test]
    fn test_multiple_or_groups_fold_into_and() {
        let filter = Filter::and([
            Filter::eq("status", "active"),
            Filter::or([Filter::ilike("first_name", "jean"), Filter::ilike("last_name", "jean")]),
            Filter::or([Filter::ilike("first_name", "dupont"), Filter::ilike("last_name", "dupont")]),
        ]);
        assert_eq!(
            params(filter),
            vec![
                pair("status", "eq.active"),
                pair(
                    "and",
                    "(or(first_name.ilike.*jean*,last_name.ilike.*jean*),or(first_name.ilike.*dupont*,last_name.ilike.*dupont*))"
                ),
            ]
        );
    }

    #[test]
    fn test_reserved_characters_are_quoted_in_groups() {
        let filter = Filter::or([Filter::ilike("email", "jean.dupont"), Filter::eq("phone", "06 12")]);
        assert_eq!(
            params(filter),
            vec![pair("or", r#"(email.ilike."*jean.dupont*",phone.eq."06 12")"#)]
        );
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            params(Filter::in_list("status", ["open", "in,progress"])),
            vec![pair("status", r#"in.(open,"in,progress")"#)]
        );
    }

    #[test]
    fn test_select_params() {
        let select = Select::from("claims")
            .columns(&["id", "status"])
            .filter(Filter::eq("status", "open"))
            .order(OrderBy::desc("created_at").then_asc("id"))
            .range(20, 39);
        assert_eq!(
            select_params(&select),
            vec![
                pair("select", "id,status"),
                pair("status", "eq.open"),
                pair("order", "created_at.desc,id.asc"),
                pair("offset", "20"),
                pair("limit", "20"),
            ]
        );
    }
}
