//! Operation dispatcher.
//!
//! [`GelAdapter`] composes schema lookups and clause fragments into complete
//! EdgeQL statements, submits each one through a [`GelClient`] exactly once,
//! and shapes the raw result for the caller.

use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::ast::*;
use crate::config::AdapterConfig;
use crate::error::{GelError, GelResult};
use crate::schema::Schema;
use crate::sdl::{SchemaFile, emit_module};
use crate::transpiler::*;

/// The database client the adapter submits statements through.
///
/// Connection handling, timeouts and cancellation belong to the client.
pub trait GelClient {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run a statement and return every resulting object as JSON.
    fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send;

    /// Run a statement returning at most one value.
    fn query_single(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;

    /// Run a statement and discard its result.
    fn execute(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl<T: GelClient + Sync> GelClient for &T {
    type Error = T::Error;

    fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send {
        (**self).query(statement, params)
    }

    fn query_single(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send {
        (**self).query_single(statement, params)
    }

    fn execute(
        &self,
        statement: &str,
        params: &Params,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        (**self).execute(statement, params)
    }
}

/// Optional arguments of [`GelAdapter::find_many`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMany {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<SortBy>,
    pub select: Option<Vec<String>>,
}

/// Translates framework operations into EdgeQL for one client.
#[derive(Debug, Clone)]
pub struct GelAdapter<C> {
    client: C,
    config: AdapterConfig,
}

impl<C: GelClient> GelAdapter<C> {
    pub fn new(client: C, config: AdapterConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn policy(&self) -> IdentityPolicy {
        if self.config.strict_ids {
            IdentityPolicy::Strict
        } else {
            IdentityPolicy::Sentinel
        }
    }

    fn type_name(&self, schema: &Schema, model: &str) -> GelResult<String> {
        schema.type_name(model, self.config.use_plural)
    }

    /// ` filter ...` (empty without conditions) and its parameters.
    fn filter(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<(String, Params)> {
        if conditions.is_empty() {
            return Ok((String::new(), Params::new()));
        }
        let clause = where_clause(conditions, model, schema)?;
        let params = filter_params(conditions, model, schema, self.policy())?;
        Ok((format!(" filter {clause}"), params))
    }

    fn statement(&self, body: String, params: Params) -> Statement {
        Statement::new(format!("with module {} {body}", self.config.module_name), params)
    }

    fn trace(&self, operation: &str, model: &str, statement: &Statement) {
        if self.config.debug_logs {
            tracing::debug!(
                operation,
                model,
                statement = %statement.text,
                params = ?statement.params,
                "gel adapter query"
            );
        }
    }

    /// `select (insert T { ... }) { shape }`
    pub fn create_statement(
        &self,
        schema: &Schema,
        model: &str,
        data: &Record,
        select: Option<&[String]>,
    ) -> GelResult<Statement> {
        let target = self.type_name(schema, model)?;
        let assignments = update_clause(data, model, schema, self.config.use_plural)?;
        let params = update_params(data, model, schema, self.policy())?;
        let shape = select_clause(model, schema, select)?;

        let insert = if assignments.is_empty() {
            format!("insert {target}")
        } else {
            format!("insert {target} {{ {assignments} }}")
        };
        Ok(self.statement(format!("select ({insert}) {{ {shape} }}"), params))
    }

    fn update_expr(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        update: &Record,
    ) -> GelResult<(String, Params)> {
        let target = self.type_name(schema, model)?;
        let assignments = update_clause(update, model, schema, self.config.use_plural)?;
        if assignments.is_empty() {
            return Err(GelError::Unsupported(format!(
                "update of {model} without any known field"
            )));
        }
        let (filter, mut params) = self.filter(schema, model, conditions)?;
        params.extend(update_params(update, model, schema, self.policy())?);
        Ok((format!("update {target}{filter} set {{ {assignments} }}"), params))
    }

    /// `select (update T filter ... set { ... }) { shape }`
    pub fn update_statement(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        update: &Record,
    ) -> GelResult<Statement> {
        let (expr, params) = self.update_expr(schema, model, conditions, update)?;
        let shape = select_clause(model, schema, None)?;
        Ok(self.statement(format!("select ({expr}) {{ {shape} }}"), params))
    }

    /// `select count((update T filter ... set { ... }))`
    pub fn update_many_statement(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        update: &Record,
    ) -> GelResult<Statement> {
        let (expr, params) = self.update_expr(schema, model, conditions, update)?;
        Ok(self.statement(format!("select count(({expr}))"), params))
    }

    /// `delete T filter ...`
    pub fn delete_statement(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<Statement> {
        let target = self.type_name(schema, model)?;
        let (filter, params) = self.filter(schema, model, conditions)?;
        Ok(self.statement(format!("delete {target}{filter}"), params))
    }

    /// `select count((delete T filter ...))`
    pub fn delete_many_statement(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
    ) -> GelResult<Statement> {
        let target = self.type_name(schema, model)?;
        let (filter, params) = self.filter(schema, model, conditions)?;
        Ok(self.statement(format!("select count((delete {target}{filter}))"), params))
    }

    /// `select count((select T filter ...))`
    pub fn count_statement(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<Statement> {
        let target = self.type_name(schema, model)?;
        let (filter, params) = self.filter(schema, model, conditions)?;
        Ok(self.statement(format!("select count((select {target}{filter}))"), params))
    }

    /// `select T { shape } filter ... limit 1`
    pub fn find_one_statement(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        select: Option<&[String]>,
    ) -> GelResult<Statement> {
        let options = FindMany {
            limit: Some(1),
            select: select.map(<[String]>::to_vec),
            ..FindMany::default()
        };
        self.find_many_statement(schema, model, conditions, &options)
    }

    /// `select T { shape } filter ... order by ... offset n limit m`
    ///
    /// Each clause is only present when its argument was given.
    pub fn find_many_statement(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        options: &FindMany,
    ) -> GelResult<Statement> {
        let target = self.type_name(schema, model)?;
        let shape = select_clause(model, schema, options.select.as_deref())?;
        let (filter, params) = self.filter(schema, model, conditions)?;

        let mut body = format!("select {target} {{ {shape} }}{filter}");
        if let Some(sort) = &options.sort_by {
            body.push_str(" order by ");
            body.push_str(&order_clause(sort, model, schema)?);
        }
        if let Some(offset) = options.offset {
            body.push_str(&format!(" offset {offset}"));
        }
        if let Some(limit) = options.limit {
            body.push_str(&format!(" limit {limit}"));
        }

        Ok(self.statement(body, params))
    }

    /// Insert one object and return it with its generated identity.
    pub async fn create(
        &self,
        schema: &Schema,
        model: &str,
        data: &Record,
        select: Option<&[String]>,
    ) -> GelResult<Value> {
        let stmt = self.create_statement(schema, model, data, select)?;
        self.trace("create", model, &stmt);
        self.client
            .query_single(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)?
            .ok_or_else(|| GelError::NoResult(format!("insert into {model}")))
    }

    /// Update matching objects and return the first, if any matched.
    pub async fn update(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        update: &Record,
    ) -> GelResult<Option<Value>> {
        let stmt = self.update_statement(schema, model, conditions, update)?;
        self.trace("update", model, &stmt);
        let rows = self
            .client
            .query(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)?;
        Ok(rows.into_iter().next())
    }

    /// Update matching objects and return how many were changed.
    pub async fn update_many(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        update: &Record,
    ) -> GelResult<u64> {
        let stmt = self.update_many_statement(schema, model, conditions, update)?;
        self.trace("updateMany", model, &stmt);
        self.scalar_count("updateMany", &stmt).await
    }

    /// Delete matching objects. Deleting nothing is not an error.
    pub async fn delete(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<()> {
        let stmt = self.delete_statement(schema, model, conditions)?;
        self.trace("delete", model, &stmt);
        self.client
            .execute(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)
    }

    /// Delete matching objects and return how many were removed.
    pub async fn delete_many(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<u64> {
        let stmt = self.delete_many_statement(schema, model, conditions)?;
        self.trace("deleteMany", model, &stmt);
        self.scalar_count("deleteMany", &stmt).await
    }

    pub async fn count(&self, schema: &Schema, model: &str, conditions: &[Where]) -> GelResult<u64> {
        let stmt = self.count_statement(schema, model, conditions)?;
        self.trace("count", model, &stmt);
        self.scalar_count("count", &stmt).await
    }

    pub async fn find_one(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        select: Option<&[String]>,
    ) -> GelResult<Option<Value>> {
        let stmt = self.find_one_statement(schema, model, conditions, select)?;
        self.trace("findOne", model, &stmt);
        self.client
            .query_single(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)
    }

    pub async fn find_many(
        &self,
        schema: &Schema,
        model: &str,
        conditions: &[Where],
        options: &FindMany,
    ) -> GelResult<Vec<Value>> {
        let stmt = self.find_many_statement(schema, model, conditions, options)?;
        self.trace("findMany", model, &stmt);
        self.client
            .query(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)
    }

    /// Generate the schema file for every model. Runs no query.
    pub fn create_schema(&self, schema: &Schema, file: Option<&Path>) -> GelResult<SchemaFile> {
        let code = emit_module(schema, &self.config)?;
        let path = file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.default_schema_path());
        Ok(SchemaFile::new(path, code))
    }

    /// A missing reply counts as zero; anything but a non-negative integer fails.
    async fn scalar_count(&self, operation: &str, stmt: &Statement) -> GelResult<u64> {
        let value = self
            .client
            .query_single(&stmt.text, &stmt.params)
            .await
            .map_err(GelError::driver)?;
        match value {
            None => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| GelError::UnexpectedResult {
                operation: operation.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// A client that records statements instead of running them.
///
/// Every query answers with the canned `rows` (empty by default).
#[derive(Debug, Default)]
pub struct DryRunClient {
    statements: Mutex<Vec<Statement>>,
    rows: Vec<Value>,
}

impl DryRunClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            rows,
        }
    }

    /// Statements submitted so far, oldest first.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Statement> {
        self.statements().pop()
    }

    fn record(&self, statement: &str, params: &Params) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Statement::new(statement, params.clone()));
    }
}

impl GelClient for DryRunClient {
    type Error = std::convert::Infallible;

    async fn query(&self, statement: &str, params: &Params) -> Result<Vec<Value>, Self::Error> {
        self.record(statement, params);
        Ok(self.rows.clone())
    }

    async fn query_single(&self, statement: &str, params: &Params) -> Result<Option<Value>, Self::Error> {
        self.record(statement, params);
        Ok(self.rows.first().cloned())
    }

    async fn execute(&self, statement: &str, params: &Params) -> Result<(), Self::Error> {
        self.record(statement, params);
        Ok(())
    }
}
