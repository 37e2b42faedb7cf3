use std::fmt::{Display, Formatter};

use rigger_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Minimum accepted device identifier length.
pub const DEVICE_ID_MIN_LENGTH: usize = 3;
/// Maximum accepted device identifier length.
pub const DEVICE_ID_MAX_LENGTH: usize = 50;
/// Minimum accepted instance name length.
pub const INSTANCE_NAME_MIN_LENGTH: usize = 3;
/// Maximum accepted instance name length.
pub const INSTANCE_NAME_MAX_LENGTH: usize = 100;

/// Identifier of a provisioning target, mapped 1:1 to a workspace directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a validated device identifier.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted so the identifier is
    /// always a single path segment.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let length = value.chars().count();
        if !(DEVICE_ID_MIN_LENGTH..=DEVICE_ID_MAX_LENGTH).contains(&length) {
            return Err(AppError::Validation(format!(
                "device_id must be between {DEVICE_ID_MIN_LENGTH} and {DEVICE_ID_MAX_LENGTH} characters"
            )));
        }

        if !value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
        {
            return Err(AppError::Validation(format!(
                "device_id '{value}' may only contain letters, digits, '-' and '_'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DeviceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Identity of one logical provisioning request.
///
/// Derived from the device identifier, so create and destroy calls for the
/// same device share one audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Derives the request identifier for a device.
    #[must_use]
    pub fn for_device(device_id: &DeviceId) -> Self {
        Self(device_id.as_str().to_owned())
    }

    /// Restores a request identifier from storage or a path parameter.
    pub fn parse(value: impl Into<String>) -> AppResult<Self> {
        DeviceId::new(value).map(|device_id| Self::for_device(&device_id))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Parameters forwarded to the external tool as variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceParams {
    instance_name: String,
}

impl InstanceParams {
    /// Creates validated instance parameters.
    pub fn new(instance_name: impl Into<String>) -> AppResult<Self> {
        let instance_name = instance_name.into();
        let length = instance_name.chars().count();
        if !(INSTANCE_NAME_MIN_LENGTH..=INSTANCE_NAME_MAX_LENGTH).contains(&length) {
            return Err(AppError::Validation(format!(
                "instance_name must be between {INSTANCE_NAME_MIN_LENGTH} and {INSTANCE_NAME_MAX_LENGTH} characters"
            )));
        }

        if instance_name.chars().any(char::is_control) {
            return Err(AppError::Validation(
                "instance_name must not contain control characters".to_owned(),
            ));
        }

        Ok(Self { instance_name })
    }

    /// Returns the instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.instance_name.as_str()
    }
}

/// Workflow applied to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOperation {
    /// Materialize the workspace and apply it.
    Create,
    /// Tear down resources previously applied for the device.
    Destroy,
}

impl ProvisionOperation {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "create" => Ok(Self::Create),
            "destroy" => Ok(Self::Destroy),
            _ => Err(AppError::Validation(format!(
                "unknown provision operation '{value}'"
            ))),
        }
    }

    /// Returns the external tool sub-command executed after initialization.
    #[must_use]
    pub fn tool_subcommand(&self) -> &'static str {
        match self {
            Self::Create => "apply",
            Self::Destroy => "destroy",
        }
    }
}

/// Immutable description of one provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    request_id: RequestId,
    user_id: NonEmptyString,
    device_id: DeviceId,
    params: InstanceParams,
}

impl ProvisionRequest {
    /// Validates raw request fields into a provisioning request.
    pub fn new(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> AppResult<Self> {
        let user_id = NonEmptyString::new(user_id)
            .map_err(|_| AppError::Validation("user must not be empty".to_owned()))?;
        let device_id = DeviceId::new(device_id)?;
        let params = InstanceParams::new(instance_name)?;

        Ok(Self {
            request_id: RequestId::for_device(&device_id),
            user_id,
            device_id,
            params,
        })
    }

    /// Returns the request identity.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the user that triggered the request.
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }

    /// Returns the target device.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the instance parameters.
    #[must_use]
    pub fn params(&self) -> &InstanceParams {
        &self.params
    }
}
