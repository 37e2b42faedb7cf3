use crate::{DeviceId, InstanceParams};

/// Root module invocation document.
pub const MAIN_FILE: &str = "main.tf";
/// Variable declarations document.
pub const VARIABLES_FILE: &str = "variables.tf";
/// Output declarations document.
pub const OUTPUTS_FILE: &str = "outputs.tf";
/// Provider and state backend declaration document.
pub const PROVIDER_FILE: &str = "provider.tf";

/// One rendered configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFile {
    /// File name relative to the workspace directory.
    pub name: &'static str,
    /// Full document content, newline terminated.
    pub content: String,
}

/// Complete document set of one device workspace, in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFiles(Vec<WorkspaceFile>);

impl WorkspaceFiles {
    /// Returns the rendered documents.
    #[must_use]
    pub fn files(&self) -> &[WorkspaceFile] {
        self.0.as_slice()
    }

    /// Returns the content of one document by file name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.content.as_str())
    }
}

/// Deployment-wide settings substituted into every workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceTemplate {
    /// Source path of the instance module, relative to the workspace.
    pub module_source: String,
    /// Machine image for new instances.
    pub ami: String,
    /// Instance size for new instances.
    pub instance_type: String,
    /// Bucket holding remote state.
    pub state_bucket: String,
    /// Cloud region for state and resources.
    pub region: String,
    /// Table used for remote state locking.
    pub lock_table: String,
}

impl Default for WorkspaceTemplate {
    fn default() -> Self {
        Self {
            module_source: "../../modules/ec2".to_owned(),
            ami: "ami-0c02fb55956c7d316".to_owned(),
            instance_type: "t3.micro".to_owned(),
            state_bucket: "infra-state-blitz-2025".to_owned(),
            region: "us-east-1".to_owned(),
            lock_table: "terraform-locks".to_owned(),
        }
    }
}

impl WorkspaceTemplate {
    /// Renders the documents for one device.
    ///
    /// Pure and deterministic: identical inputs yield identical bytes.
    #[must_use]
    pub fn render(&self, device_id: &DeviceId, params: &InstanceParams) -> WorkspaceFiles {
        WorkspaceFiles(vec![
            WorkspaceFile {
                name: PROVIDER_FILE,
                content: self.render_provider(device_id),
            },
            WorkspaceFile {
                name: VARIABLES_FILE,
                content: render_variables(),
            },
            WorkspaceFile {
                name: OUTPUTS_FILE,
                content: render_outputs(),
            },
            WorkspaceFile {
                name: MAIN_FILE,
                content: self.render_main(device_id, params),
            },
        ])
    }

    fn render_main(&self, device_id: &DeviceId, params: &InstanceParams) -> String {
        format!(
            r#"module "ec2" {{
  source        = "{source}"
  ami           = "{ami}"
  instance_type = "{instance_type}"
  instance_name = "{instance_name}"
  device_id     = "{device_id}"
}}
"#,
            source = hcl_escape(self.module_source.as_str()),
            ami = hcl_escape(self.ami.as_str()),
            instance_type = hcl_escape(self.instance_type.as_str()),
            instance_name = hcl_escape(params.instance_name()),
            device_id = device_id.as_str(),
        )
    }

    fn render_provider(&self, device_id: &DeviceId) -> String {
        format!(
            r#"terraform {{
  required_version = ">= 1.1.0"
  backend "s3" {{
    bucket         = "{bucket}"
    key            = "state/{device_id}.tfstate"
    region         = "{region}"
    dynamodb_table = "{lock_table}"
    encrypt        = true
  }}
}}
provider "aws" {{
  region = "{region}"
}}
"#,
            bucket = hcl_escape(self.state_bucket.as_str()),
            device_id = device_id.as_str(),
            region = hcl_escape(self.region.as_str()),
            lock_table = hcl_escape(self.lock_table.as_str()),
        )
    }
}

fn render_variables() -> String {
    r#"variable "device_id" {
  description = "Unique device identifier"
  type        = string
}
variable "instance_name" {
  description = "EC2 instance name"
  type        = string
}
"#
    .to_owned()
}

fn render_outputs() -> String {
    r#"output "ec2_instance_id" {
  description = "ID of the EC2 instance"
  value       = module.ec2.instance_id
}
output "ec2_public_ip" {
  description = "Public IP of the EC2 instance"
  value       = module.ec2.public_ip
}
"#
    .to_owned()
}

// Template sequences are escaped too so user input stays a literal.
fn hcl_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut characters = value.chars().peekable();
    while let Some(character) = characters.next() {
        match character {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' | '%' if characters.peek() == Some(&'{') => {
                escaped.push(character);
                escaped.push(character);
            }
            _ => escaped.push(character),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn device(value: &str) -> DeviceId {
        let Ok(device_id) = DeviceId::new(value) else {
            panic!("device id should be valid");
        };
        device_id
    }

    fn params(value: &str) -> InstanceParams {
        let Ok(params) = InstanceParams::new(value) else {
            panic!("instance params should be valid");
        };
        params
    }

    #[test]
    fn renders_four_named_documents() {
        let files = WorkspaceTemplate::default().render(&device("dev123"), &params("web-1"));
        let names: Vec<&str> = files.files().iter().map(|file| file.name).collect();
        assert_eq!(
            names,
            vec![PROVIDER_FILE, VARIABLES_FILE, OUTPUTS_FILE, MAIN_FILE]
        );
    }

    #[test]
    fn state_key_and_module_call_are_device_scoped() {
        let files = WorkspaceTemplate::default().render(&device("dev123"), &params("web-1"));
        assert!(
            files
                .get(PROVIDER_FILE)
                .is_some_and(|content| content.contains("key            = \"state/dev123.tfstate\""))
        );
        assert!(
            files
                .get(MAIN_FILE)
                .is_some_and(|content| content.contains("instance_name = \"web-1\""))
        );
    }

    #[test]
    fn instance_name_cannot_break_out_of_string_literal() {
        let files =
            WorkspaceTemplate::default().render(&device("dev123"), &params("web\" ${evil}"));
        assert!(
            files
                .get(MAIN_FILE)
                .is_some_and(|content| content.contains("instance_name = \"web\\\" $${evil}\""))
        );
    }

    #[test]
    fn documents_end_with_single_newline() {
        let files = WorkspaceTemplate::default().render(&device("dev123"), &params("web-1"));
        for file in files.files() {
            assert!(file.content.ends_with('\n'));
            assert!(!file.content.ends_with("\n\n"));
        }
    }

    proptest! {
        #[test]
        fn rendering_is_deterministic(
            device_value in "[A-Za-z0-9_-]{3,50}",
            instance_name in "[ -~]{3,100}",
        ) {
            let template = WorkspaceTemplate::default();
            let device_id = device(device_value.as_str());
            let instance_params = params(instance_name.as_str());

            let first = template.render(&device_id, &instance_params);
            let second = template.render(&device_id, &instance_params);
            prop_assert_eq!(first, second);
        }
    }
}
