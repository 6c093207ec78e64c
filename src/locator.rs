use crate::error::AgentError;

/// A resolved strategy for finding a page element from a step target.
///
/// The grammar is the one the planner prompt documents: an empty target is
/// the document body, `text=` is a case-insensitive substring match on
/// visible text, `role=` is an accessibility role with an optional name
/// after `:`, and everything else is a raw CSS selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Body,
    Text(String),
    Role { role: String, name: Option<String> },
    Css(String),
}

/// How a locator is actually queried against the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

impl Locator {
    /// Parse a target string. The only rejected form is `role=` with an
    /// empty role (e.g. `role=:Submit`), which fails loudly instead of
    /// silently matching nothing.
    pub fn parse(target: &str) -> Result<Locator, AgentError> {
        let target = target.trim();
        if target.is_empty() {
            return Ok(Locator::Body);
        }
        if let Some(text) = target.strip_prefix("text=") {
            return Ok(Locator::Text(text.to_string()));
        }
        if let Some(spec) = target.strip_prefix("role=") {
            let (role, name) = match spec.split_once(':') {
                Some((role, name)) => (role, (!name.is_empty()).then(|| name.to_string())),
                None => (spec, None),
            };
            if role.is_empty() {
                return Err(AgentError::InvalidLocator(target.to_string()));
            }
            return Ok(Locator::Role {
                role: role.to_string(),
                name,
            });
        }
        Ok(Locator::Css(target.to_string()))
    }

    pub fn query(&self) -> Query {
        match self {
            Locator::Body => Query::Css("body".to_string()),
            Locator::Text(text) => Query::XPath(xpath_text_match(text)),
            Locator::Role { role, name } => Query::XPath(xpath_role_match(role, name.as_deref())),
            Locator::Css(selector) => Query::Css(selector.clone()),
        }
    }
}

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Case-insensitive substring predicate over `expr`.
fn ci_contains(expr: &str, needle: &str) -> String {
    format!(
        "contains(translate({expr}, '{UPPER}', '{LOWER}'), {})",
        xpath_literal(&needle.to_lowercase())
    )
}

/// Matches elements that directly contain a matching text node, so the
/// first match is the labelled element rather than an enclosing container.
fn xpath_text_match(text: &str) -> String {
    format!("//*[text()[{}]]", ci_contains("normalize-space(.)", text))
}

fn xpath_role_match(role: &str, name: Option<&str>) -> String {
    // Implicit roles for the tags the planner actually emits.
    let tag = match role {
        "link" => "a",
        "textbox" => "input",
        other => other,
    };
    let mut xpath = format!(
        "//*[@role={} or local-name()={}]",
        xpath_literal(role),
        xpath_literal(tag)
    );
    if let Some(name) = name {
        xpath.push_str(&format!("[{}]", ci_contains("normalize-space(.)", name)));
    }
    xpath
}

/// Quote a string as an XPath 1.0 literal, falling back to concat() when
/// both quote kinds appear in the input.
fn xpath_literal(input: &str) -> String {
    if !input.contains('\'') {
        format!("'{input}'")
    } else if !input.contains('"') {
        format!("\"{input}\"")
    } else {
        let parts: Vec<String> = input.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(",\"'\","))
    }
}
