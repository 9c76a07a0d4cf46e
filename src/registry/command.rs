//! Typed commands for the `(function name, arguments)` call surface

use super::lookup::LookupFilter;
use crate::core::{RegistryError, Result, Worker};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFunction {
    Register,
    Update,
    SetStatus,
    LookUp,
    LookUpNext,
    Retrieve,
    Query,
}

/// Accepted function names; each function has a canonical name and a short alias.
const FUNCTION_TABLE: &[(&str, RegistryFunction)] = &[
    ("workerRegister", RegistryFunction::Register),
    ("register", RegistryFunction::Register),
    ("workerUpdate", RegistryFunction::Update),
    ("update", RegistryFunction::Update),
    ("workerSetStatus", RegistryFunction::SetStatus),
    ("setStatus", RegistryFunction::SetStatus),
    ("workerLookUp", RegistryFunction::LookUp),
    ("lookup", RegistryFunction::LookUp),
    ("workerLookUpNext", RegistryFunction::LookUpNext),
    ("lookupNext", RegistryFunction::LookUpNext),
    ("workerRetrieve", RegistryFunction::Retrieve),
    ("retrieve", RegistryFunction::Retrieve),
    ("query", RegistryFunction::Query),
];

impl RegistryFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        FUNCTION_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, function)| *function)
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Register => "workerRegister",
            Self::Update => "workerUpdate",
            Self::SetStatus => "workerSetStatus",
            Self::LookUp => "workerLookUp",
            Self::LookUpNext => "workerLookUpNext",
            Self::Retrieve => "workerRetrieve",
            Self::Query => "query",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Register => 5,
            Self::Update | Self::SetStatus => 2,
            Self::LookUp => 3,
            Self::LookUpNext => 4,
            Self::Retrieve | Self::Query => 1,
        }
    }

    fn argument_names(self) -> &'static str {
        match self {
            Self::Register => "workerID, workerType, organizationID, applicationTypeId, and details",
            Self::Update => "workerID and details",
            Self::SetStatus => "workerID and status",
            Self::LookUp => "workerType, organizationID and applicationTypeId",
            Self::LookUpNext => "workerType, organizationID, applicationTypeId and lookupTag",
            Self::Retrieve => "workerID",
            Self::Query => "key",
        }
    }
}

impl fmt::Display for RegistryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A validated registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCommand {
    Register(Worker),
    Update { worker_id: String, details: String },
    SetStatus { worker_id: String, status: u64 },
    LookUp(LookupFilter),
    LookUpNext { filter: LookupFilter, lookup_tag: String },
    Retrieve { worker_id: String },
    Query { key: String },
}

impl RegistryCommand {
    /// Validate argument shape and build the command for `function`.
    pub fn parse(function: &str, args: &[String]) -> Result<Self> {
        let function = RegistryFunction::from_name(function).ok_or_else(|| {
            RegistryError::Validation(format!("Invalid invoke function name '{}'", function))
        })?;

        if args.len() != function.arity() {
            return Err(RegistryError::Validation(format!(
                "{} must include {} arguments, {}; received {}",
                function,
                function.arity(),
                function.argument_names(),
                args.len()
            )));
        }

        let command = match function {
            RegistryFunction::Register => {
                let worker_type = args[1]
                    .parse::<u64>()
                    .map_err(|_| RegistryError::Validation("Worker Type must be an integer".into()))?;
                // an empty argument registers a worker with no application types
                let application_type_ids = if args[3].is_empty() {
                    Vec::new()
                } else {
                    args[3].split(',').map(str::to_string).collect()
                };
                Self::Register(Worker::new(
                    args[0].clone(),
                    worker_type,
                    args[2].clone(),
                    application_type_ids,
                    args[4].clone(),
                ))
            }
            RegistryFunction::Update => Self::Update {
                worker_id: args[0].clone(),
                details: args[1].clone(),
            },
            RegistryFunction::SetStatus => {
                let status = args[1].parse::<u64>().map_err(|_| {
                    RegistryError::Validation(format!("Worker status must be an integer, received '{}'", args[1]))
                })?;
                Self::SetStatus {
                    worker_id: args[0].clone(),
                    status,
                }
            }
            RegistryFunction::LookUp => Self::LookUp(LookupFilter::parse(&args[0], &args[1], &args[2])?),
            RegistryFunction::LookUpNext => Self::LookUpNext {
                filter: LookupFilter::parse(&args[0], &args[1], &args[2])?,
                lookup_tag: args[3].clone(),
            },
            RegistryFunction::Retrieve => Self::Retrieve {
                worker_id: args[0].clone(),
            },
            RegistryFunction::Query => Self::Query { key: args[0].clone() },
        };
        Ok(command)
    }

    pub fn function(&self) -> RegistryFunction {
        match self {
            Self::Register(_) => RegistryFunction::Register,
            Self::Update { .. } => RegistryFunction::Update,
            Self::SetStatus { .. } => RegistryFunction::SetStatus,
            Self::LookUp(_) => RegistryFunction::LookUp,
            Self::LookUpNext { .. } => RegistryFunction::LookUpNext,
            Self::Retrieve { .. } => RegistryFunction::Retrieve,
            Self::Query { .. } => RegistryFunction::Query,
        }
    }
}
