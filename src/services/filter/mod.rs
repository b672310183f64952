//! Filter construction for log queries.
//!
//! Turns a free-text expression and/or field-equality constraints into
//! a single predicate over a [`LogEvent`]. Three modes, tried in order:
//!
//! 1. text without whitespace or operator characters is a plain,
//!    case-insensitive substring match on the rendered message;
//! 2. anything else compiles as a structured boolean expression;
//! 3. a failed structured compile silently falls back to the substring
//!    match over the whole original text — a typo degrades the search
//!    instead of failing it (deliberate, observed behavior).

mod eval;
mod expr;
mod resolver;

pub use resolver::{BuiltInNameResolver, NameResolver};

use std::sync::Arc;
use tracing::debug;

use crate::models::event::LogEvent;
use crate::models::search::EventFilter;

/// A compiled, pure predicate over events.
pub type EventPredicate = Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>;

/// Characters that rule out the plain-text mode.
const EXPRESSION_OPERATORS: [char; 10] = ['@', '(', ')', '+', '=', '*', '<', '>', '%', '-'];

/// Builds event predicates from query requests.
pub struct LogSessionFilterFactory {
    resolver: Arc<dyn NameResolver>,
}

impl Default for LogSessionFilterFactory {
    fn default() -> Self {
        Self::new(Arc::new(BuiltInNameResolver))
    }
}

impl LogSessionFilterFactory {
    pub fn new(resolver: Arc<dyn NameResolver>) -> Self {
        Self { resolver }
    }

    /// Compile an expression and/or equality constraints into one
    /// predicate. `None` means "no filter" — the caller passes every
    /// event through.
    pub fn try_create_filter(
        &self,
        expression: Option<&str>,
        filters: Option<&[EventFilter]>,
    ) -> Option<EventPredicate> {
        let mut expression = expression.unwrap_or_default().trim().to_string();

        if let Some(filters) = filters.filter(|filters| !filters.is_empty()) {
            let clause = filters
                .iter()
                .map(|filter| {
                    format!(
                        "{} = '{}'",
                        filter.property,
                        escape_string_content(&filter.value)
                    )
                })
                .collect::<Vec<_>>()
                .join(" and ");
            expression = if expression.is_empty() {
                clause
            } else {
                format!("{} and {}", expression, clause)
            };
        }

        if expression.is_empty() {
            return None;
        }

        if is_plain_text(&expression) {
            return Some(message_contains(&expression));
        }

        match expr::compile(&expression, self.resolver.as_ref()) {
            Ok(compiled) => Some(Arc::new(move |event: &LogEvent| {
                eval::is_true(&eval::evaluate(&compiled, event))
            })),
            Err(error) => {
                // fail-soft: degrade to substring search over the raw text
                debug!(
                    expression = %expression,
                    error = %error,
                    "Filter expression failed to compile, falling back to substring search"
                );
                Some(message_contains(&expression))
            }
        }
    }
}

fn is_plain_text(expression: &str) -> bool {
    !expression.contains(char::is_whitespace) && !expression.contains(EXPRESSION_OPERATORS)
}

fn message_contains(text: &str) -> EventPredicate {
    let needle = text.to_lowercase();
    Arc::new(move |event: &LogEvent| event.rendered_message.to_lowercase().contains(&needle))
}

/// Escape a value for embedding in a single-quoted string literal.
fn escape_string_content(value: &str) -> String {
    value.replace('\'', "''")
}
