//! Shared test doubles for orchestrator integration tests.
#![allow(dead_code)]

use neosec_core::domain::adapter::{
    AdapterError, CommandRequest, ParsedOutput, RawOutput, ToolAdapter, ToolCategory,
    ToolDescriptor,
};
use neosec_core::domain::asset::{Asset, Host};

/// Runs a fixed argv and reports one host named after the adapter (or the
/// trimmed stdout when `host_from_stdout` is set).
pub struct FixedAdapter {
    pub name: &'static str,
    pub argv: Vec<String>,
    pub host_from_stdout: bool,
    pub fail_parse: bool,
    pub required: Vec<String>,
}

impl FixedAdapter {
    pub fn new(name: &'static str, argv: &[&str]) -> Self {
        Self {
            name,
            argv: argv.iter().map(|s| s.to_string()).collect(),
            host_from_stdout: false,
            fail_parse: false,
            required: vec![],
        }
    }
}

impl ToolAdapter for FixedAdapter {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.to_string(),
            category: ToolCategory::Other,
            description: format!("{} test stub", self.name),
            required_binaries: self.required.clone(),
        }
    }

    fn name(&self) -> &str {
        self.name
    }

    fn build_command(&self, request: &CommandRequest<'_>) -> Result<Vec<String>, AdapterError> {
        let mut argv = self.argv.clone();
        if self.host_from_stdout {
            argv.push(request.target.as_str().to_string());
        }
        Ok(argv)
    }

    fn parse_output(&self, output: &RawOutput<'_>) -> Result<ParsedOutput, AdapterError> {
        if self.fail_parse {
            return Err(AdapterError::Parse {
                tool: self.name.to_string(),
                format: "text".to_string(),
                reason: "synthetic parse failure".to_string(),
            });
        }

        let address = if self.host_from_stdout {
            output.stdout_str().trim().to_string()
        } else {
            format!("asset-from-{}", self.name)
        };
        let mut asset = Asset::new(self.name);
        asset.hosts.push(Host::new(address));
        Ok(ParsedOutput {
            assets: vec![asset],
            vulnerabilities: vec![],
        })
    }
}
