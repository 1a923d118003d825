//! Operation table: canonical operation names, aliases, and the single
//! entry point that routes positional string arguments to the record layer.

pub mod alias;
mod handlers;

use crate::{
    config::Config,
    db::Db,
    error::{ErrorClass, ErrorOrigin, InternalError},
    ledger::Ledger,
    model::RecordModel,
};
use std::{collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

// re-exports
pub use alias::Alias;

///
/// Operation
/// Canonical operations understood by the dispatcher.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    RangeQuery,
    PrefixQuery,
    PredicateQuery,
    History,
    QueryByField,
    UpdateByIndex,
    AuditIndex,
}

impl Operation {
    pub const ALL: [Self; 11] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::RangeQuery,
        Self::PrefixQuery,
        Self::PredicateQuery,
        Self::History,
        Self::QueryByField,
        Self::UpdateByIndex,
        Self::AuditIndex,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::RangeQuery => "range-query",
            Self::PrefixQuery => "prefix-query",
            Self::PredicateQuery => "predicate-query",
            Self::History => "history",
            Self::QueryByField => "query-by-field",
            Self::UpdateByIndex => "update-by-index",
            Self::AuditIndex => "audit-index",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

///
/// Route
/// Resolved target of one invocable name.
///

#[derive(Clone, Debug, Eq, PartialEq)]
struct Route {
    op: Operation,
    alias: Alias,
}

///
/// Dispatcher
///
/// Name to operation table resolved once at construction.
/// Every canonical operation is routed under its own name; aliases add
/// further names, optionally binding leading arguments.
///

#[derive(Clone, Debug)]
pub struct Dispatcher {
    model: RecordModel,
    routes: BTreeMap<String, Route>,
}

impl Dispatcher {
    /// Dispatcher over `model` with only the canonical operation names.
    pub fn new(model: RecordModel) -> Result<Self, InternalError> {
        model.validate()?;

        let routes = Operation::ALL
            .into_iter()
            .map(|op| {
                (
                    op.name().to_string(),
                    Route {
                        op,
                        alias: Alias::op(op.name()),
                    },
                )
            })
            .collect();

        Ok(Self { model, routes })
    }

    /// Dispatcher for a validated configuration, aliases included.
    pub fn from_config(config: &Config) -> Result<Self, InternalError> {
        config.validate()?;

        let mut dispatcher = Self::new(config.record_model())?;
        for (name, alias) in config.aliases() {
            dispatcher = dispatcher.with_alias(name, &alias)?;
        }

        Ok(dispatcher)
    }

    /// Route `name` to the canonical operation `alias` names.
    pub fn with_alias(
        mut self,
        name: impl Into<String>,
        alias: &Alias,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        if Operation::from_name(&name).is_some() {
            return Err(DispatchError::AliasShadows(name));
        }
        let op = Operation::from_name(&alias.op).ok_or_else(|| DispatchError::AliasTarget {
            alias: name.clone(),
            target: alias.op.clone(),
        })?;

        self.routes.insert(
            name,
            Route {
                op,
                alias: alias.clone(),
            },
        );

        Ok(self)
    }

    #[must_use]
    pub const fn model(&self) -> &RecordModel {
        &self.model
    }

    /// Every invocable name with the operation it resolves to.
    pub fn operations(&self) -> impl Iterator<Item = (&str, Operation)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route.op))
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Operation> {
        self.routes.get(name).map(|route| route.op)
    }

    /// Run one operation against `ledger`. Success payloads are bytes;
    /// failures carry their class and origin.
    pub fn invoke<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        name: &str,
        args: &[String],
    ) -> Result<Vec<u8>, InternalError> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))?;
        let args = route.alias.expand(args);

        tracing::debug!(name, op = %route.op, args = args.len(), "invoke");

        let mut db = Db::new(ledger, &self.model);
        handlers::run(route.op, &mut db, &args).inspect_err(|err| {
            tracing::debug!(
                name,
                op = %route.op,
                error = %err.display_with_class(),
                "invoke failed"
            );
        })
    }
}

///
/// DispatchError
///

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("{op} expects {expected} argument(s), got {got}")]
    Arity {
        op: Operation,
        expected: String,
        got: usize,
    },

    #[error("alias '{alias}' targets unknown operation '{target}'")]
    AliasTarget { alias: String, target: String },

    #[error("alias '{0}' shadows a canonical operation")]
    AliasShadows(String),
}

impl DispatchError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownOperation(_)
            | Self::Arity { .. }
            | Self::AliasTarget { .. }
            | Self::AliasShadows(_) => ErrorClass::InvalidArgument,
        }
    }
}

impl From<DispatchError> for InternalError {
    fn from(err: DispatchError) -> Self {
        Self::new(err.class(), ErrorOrigin::Dispatch, err.to_string())
    }
}
