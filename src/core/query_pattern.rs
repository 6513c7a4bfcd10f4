//! Batch statements
//!
//! A [`QueryPattern`] pairs one statement with the parameter maps it is
//! executed with. A batch of patterns is applied atomically by
//! [`DataRepository::save_changes`](super::repository::DataRepository::save_changes).

use super::error::{DatabaseError, Result};
use super::parameters::Parameters;

/// One statement plus the parameter maps to execute it with, in order
///
/// With no parameter maps the statement runs once, unparameterized. With N
/// maps it runs N times, each execution binding only its own map.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPattern {
    statement: String,
    parameter_sets: Vec<Parameters>,
}

impl QueryPattern {
    /// Create a pattern with no parameter maps
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidInput`] if `statement` is blank
    pub fn new(statement: impl Into<String>) -> Result<Self> {
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(DatabaseError::invalid_input(
                "query pattern statement must not be empty",
            ));
        }
        Ok(Self {
            statement,
            parameter_sets: Vec::new(),
        })
    }

    /// Append one parameter map
    pub fn with_parameters(mut self, parameters: impl Into<Parameters>) -> Self {
        self.parameter_sets.push(parameters.into());
        self
    }

    /// Append several parameter maps, keeping their order
    pub fn with_parameter_sets<I>(mut self, sets: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Parameters>,
    {
        self.parameter_sets.extend(sets.into_iter().map(Into::into));
        self
    }

    /// The SQL statement
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Parameter maps in execution order
    pub fn parameter_sets(&self) -> &[Parameters] {
        &self.parameter_sets
    }

    /// How many times the statement will be executed
    pub fn execution_count(&self) -> usize {
        self.parameter_sets.len().max(1)
    }
}

/// Build a pattern executing `statement` once with `parameters`
///
/// Every call returns a fresh value; nothing is retained between calls.
pub fn build_query_pattern(
    statement: impl Into<String>,
    parameters: impl Into<Parameters>,
) -> Result<QueryPattern> {
    Ok(QueryPattern::new(statement)?.with_parameters(parameters))
}
