pub mod policy;

pub use policy::{PermissiveStatusPolicy, StatusContext, TransformationStatusPolicy};

use crate::{error::GateError, retry::call_with_retry};
use engine_core::{error::RemoteError, remote::TransformationService, retry::RetryPolicy};
use model::{
    core::identifiers::TransformationId,
    transformation::{record::STATUS_PARAMETER, status::TransformationStatus},
};
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

const TYPE_PARAMETER: &str = "Type";

/// What a parameter write ended up storing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterWrite {
    pub name: String,
    pub requested: Value,
    pub written: Value,
}

impl ParameterWrite {
    pub fn was_overridden(&self) -> bool {
        self.requested != self.written
    }
}

/// Routes writes of the `Status` parameter through a
/// [`TransformationStatusPolicy`]. Other parameters pass through untouched.
#[derive(Clone)]
pub struct TransformationStatusGate {
    service: Arc<dyn TransformationService>,
    policy: Arc<dyn TransformationStatusPolicy>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl TransformationStatusGate {
    pub fn new(
        service: Arc<dyn TransformationService>,
        policy: Arc<dyn TransformationStatusPolicy>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            service,
            policy,
            retry,
            call_timeout,
        }
    }

    pub async fn set_parameter(
        &self,
        transformation_id: TransformationId,
        name: &str,
        value: Value,
        force: bool,
    ) -> Result<ParameterWrite, GateError> {
        let written = if name.eq_ignore_ascii_case(STATUS_PARAMETER) {
            let proposed = parse_status(&value)?;
            let context = self.status_context(transformation_id).await?;
            let decided = self.policy.decide(&context, proposed, force);
            if decided != proposed {
                info!(
                    transformation = %transformation_id,
                    current = %context.current,
                    proposed = %proposed,
                    decided = %decided,
                    "Status policy replaced the proposed status"
                );
            }
            Value::from(decided.as_str())
        } else {
            value.clone()
        };

        let service = &self.service;
        let written_ref = &written;
        call_with_retry(&self.retry, "set_parameter", self.call_timeout, move || {
            service.set_transformation_parameter(transformation_id, name, written_ref)
        })
        .await
        .map_err(|err| GateError::Write {
            transformation_id,
            name: name.to_string(),
            source: err.into_inner(),
        })?;

        debug!(
            transformation = %transformation_id,
            parameter = name,
            value = %written,
            "Parameter written"
        );
        Ok(ParameterWrite {
            name: name.to_string(),
            requested: value,
            written,
        })
    }

    async fn status_context(
        &self,
        transformation_id: TransformationId,
    ) -> Result<StatusContext, GateError> {
        let names = [STATUS_PARAMETER.to_string(), TYPE_PARAMETER.to_string()];
        let service = &self.service;
        let names_ref = &names[..];
        let mut values = call_with_retry(
            &self.retry,
            "get_parameters",
            self.call_timeout,
            move || service.get_transformation_parameters(transformation_id, names_ref),
        )
        .await
        .map_err(|err| GateError::Lookup {
            transformation_id,
            source: err.into_inner(),
        })?;

        let current = values
            .remove(STATUS_PARAMETER)
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<TransformationStatus>().ok())
            .ok_or_else(|| GateError::Lookup {
                transformation_id,
                source: RemoteError::InvalidArgument(
                    "service returned no readable Status".to_string(),
                ),
            })?;
        let kind = values
            .remove(TYPE_PARAMETER)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        Ok(StatusContext {
            transformation_id,
            current,
            kind,
        })
    }
}

fn parse_status(value: &Value) -> Result<TransformationStatus, GateError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GateError::InvalidStatus(value.to_string()))
}
