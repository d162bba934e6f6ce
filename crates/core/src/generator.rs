//! Generates the Python source, dependency manifest and README for a
//! composed MCP server. The supervisor treats all three as opaque text; only
//! this module interprets a `ServerConfig`.

use busbar_shared::{PromptSpec, ResourceSpec, ServerConfig, ToolSpec};
use serde_json::{json, Value};

/// Escape a string for inclusion inside a double-quoted Python literal.
fn py_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn input_schema_or_default(tool: &ToolSpec) -> Value {
    if tool.input_schema.is_null() {
        json!({"type": "object", "properties": {}, "required": []})
    } else {
        tool.input_schema.clone()
    }
}

fn tool_schema_entry(tool: &ToolSpec) -> String {
    let schema = serde_json::to_string_pretty(&input_schema_or_default(tool))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        "        Tool(\n            name=\"{name}\",\n            description=\"{description}\",\n            inputSchema={schema}\n        )",
        name = py_str(&tool.name),
        description = py_str(&tool.description),
    )
}

fn tool_branch(tool: &ToolSpec) -> String {
    let implementation = tool
        .implementation
        .as_deref()
        .unwrap_or("# TODO: Implement tool logic\nreturn \"Not implemented\"");
    let body: String = implementation
        .lines()
        .map(|line| format!("        {line}\n"))
        .collect();
    format!(
        "    if name == \"{name}\":\n        # {description}\n{body}",
        name = py_str(&tool.name),
        description = py_str(&tool.description),
    )
}

fn tool_handlers(tools: &[ToolSpec]) -> String {
    if tools.is_empty() {
        return "# No tool handlers defined".to_string();
    }
    let branches: String = tools.iter().map(tool_branch).collect::<Vec<_>>().join("\n");
    format!(
        "@server.call_tool()\nasync def call_tool(name: str, arguments: dict) -> list[TextContent]:\n    \"\"\"Handle tool execution requests\"\"\"\n{branches}\n    raise ValueError(f\"Unknown tool: {{name}}\")"
    )
}

fn resource_entry(resource: &ResourceSpec) -> String {
    format!(
        "        # Resource: {name}\n        Resource(\n            uri=AnyUrl(\"{uri}\"),\n            name=\"{name}\",\n            description=\"{description}\",\n            mimeType=\"{mime_type}\"\n        ),",
        name = py_str(&resource.name),
        uri = py_str(&resource.uri),
        description = py_str(&resource.description),
        mime_type = py_str(&resource.mime_type),
    )
}

fn prompt_entry(prompt: &PromptSpec) -> String {
    let arguments: String = prompt
        .arguments
        .iter()
        .map(|arg| {
            format!(
                "                PromptArgument(name=\"{name}\", description=\"{description}\", required={required}),",
                name = py_str(&arg.name),
                description = py_str(&arg.description),
                required = py_bool(arg.required),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let arguments_block = if arguments.is_empty() {
        "[]".to_string()
    } else {
        format!("[\n{arguments}\n            ]")
    };
    format!(
        "        Prompt(\n            name=\"{name}\",\n            description=\"{description}\",\n            arguments={arguments_block}\n        ),",
        name = py_str(&prompt.name),
        description = py_str(&prompt.description),
    )
}

fn prompt_branch(prompt: &PromptSpec) -> String {
    format!(
        r#"    if name == "{name}":
        template = """{template}"""
        if arguments:
            for key, value in arguments.items():
                template = template.replace("{{{{" + key + "}}}}", str(value))
        return GetPromptResult(
            description="{description}",
            messages=[
                PromptMessage(
                    role="user",
                    content=TextContent(type="text", text=template)
                )
            ]
        )
"#,
        name = py_str(&prompt.name),
        description = py_str(&prompt.description),
        template = prompt.template,
    )
}

fn prompt_handlers(prompts: &[PromptSpec]) -> String {
    if prompts.is_empty() {
        return "# No prompt handlers defined".to_string();
    }
    let entries: String = prompts.iter().map(prompt_entry).collect::<Vec<_>>().join("\n");
    let branches: String = prompts.iter().map(prompt_branch).collect::<Vec<_>>().join("\n");
    format!(
        "@server.list_prompts()\nasync def list_prompts() -> list[Prompt]:\n    \"\"\"List available prompts\"\"\"\n    return [\n{entries}\n    ]\n\n\n@server.get_prompt()\nasync def get_prompt(name: str, arguments: dict | None = None) -> GetPromptResult:\n    \"\"\"Get a specific prompt\"\"\"\n{branches}\n    raise ValueError(f\"Unknown prompt: {{name}}\")"
    )
}

/// Generate the complete `server.py` for a configuration.
pub fn generate_server(config: &ServerConfig) -> String {
    let tools_code = if config.tools.is_empty() {
        "        # No tools defined".to_string()
    } else {
        config
            .tools
            .iter()
            .map(tool_schema_entry)
            .collect::<Vec<_>>()
            .join(",\n")
    };
    let resources_code = if config.resources.is_empty() {
        "        # No resources defined".to_string()
    } else {
        config
            .resources
            .iter()
            .map(resource_entry)
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"#!/usr/bin/env python3
"""
{name}
{description}

Generated MCP Server - Version {version}
"""

import asyncio
import json
from typing import Any
from mcp.server import Server
from mcp.server.stdio import stdio_server
from mcp.types import (
    Resource,
    Tool,
    TextContent,
    ImageContent,
    EmbeddedResource,
    Prompt,
    PromptArgument,
    PromptMessage,
    GetPromptResult,
)
from pydantic import AnyUrl

# Initialize MCP server
server = Server("{name}")


@server.list_resources()
async def list_resources() -> list[Resource]:
    """List available resources"""
    return [
{resources_code}
    ]


@server.read_resource()
async def read_resource(uri: AnyUrl) -> str:
    """Read a specific resource"""
    # TODO: Implement resource reading logic
    return f"Content of resource: {{uri}}"


@server.list_tools()
async def list_tools() -> list[Tool]:
    """List available tools"""
    return [
{tools_code}
    ]


{tool_handlers}

{prompt_handlers}


async def main():
    """Main entry point for the MCP server"""
    async with stdio_server() as (read_stream, write_stream):
        await server.run(
            read_stream,
            write_stream,
            server.create_initialization_options()
        )


if __name__ == "__main__":
    asyncio.run(main())
"#,
        name = config.name,
        description = config.description,
        version = config.version,
        resources_code = resources_code,
        tools_code = tools_code,
        tool_handlers = tool_handlers(&config.tools),
        prompt_handlers = prompt_handlers(&config.prompts),
    )
}

/// Dependency manifest for a generated server.
pub fn generate_requirements() -> String {
    "mcp>=0.1.0\npydantic>=2.0.0\n".to_string()
}

/// README shipped with an exported server.
pub fn generate_readme(config: &ServerConfig) -> String {
    let section = |lines: Vec<String>, empty: &str| {
        if lines.is_empty() {
            empty.to_string()
        } else {
            lines.join("\n")
        }
    };
    let tools = section(
        config
            .tools
            .iter()
            .map(|t| format!("- **{}**: {}", t.name, t.description))
            .collect(),
        "No tools defined",
    );
    let resources = section(
        config
            .resources
            .iter()
            .map(|r| format!("- **{}** (`{}`): {}", r.name, r.uri, r.description))
            .collect(),
        "No resources defined",
    );
    let prompts = section(
        config
            .prompts
            .iter()
            .map(|p| format!("- **{}**: {}", p.name, p.description))
            .collect(),
        "No prompts defined",
    );

    format!(
        r#"# {name}

{description}

## Installation

1. Install dependencies:
```bash
pip install -r requirements.txt
```

## Running the Server

```bash
python server.py
```

## Features

### Tools
{tools}

### Resources
{resources}

### Prompts
{prompts}

## Usage with Claude Desktop

Add this server to your Claude Desktop configuration:

```json
{{
  "mcpServers": {{
    "{slug}": {{
      "command": "python",
      "args": ["/path/to/server.py"]
    }}
  }}
}}
```

## Development

Edit `server.py` to customize the implementation of tools, resources, and prompts.
"#,
        name = config.name,
        description = config.description,
        slug = config.name.to_lowercase().replace(' ', "-"),
        tools = tools,
        resources = resources,
        prompts = prompts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use busbar_shared::PromptArgument;
    use serde_json::json;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            id: "srv1".to_string(),
            name: "Weather Server".to_string(),
            description: "Forecast tools".to_string(),
            version: "1.0.0".to_string(),
            tools: vec![ToolSpec {
                id: "t1".to_string(),
                name: "get_forecast".to_string(),
                description: "Fetch a forecast".to_string(),
                input_schema: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
                implementation: Some("return [TextContent(type=\"text\", text=\"sunny\")]".to_string()),
            }],
            resources: vec![ResourceSpec {
                id: "r1".to_string(),
                uri: "weather://current".to_string(),
                name: "Current".to_string(),
                description: "Current conditions".to_string(),
                mime_type: "application/json".to_string(),
            }],
            prompts: vec![PromptSpec {
                id: "p1".to_string(),
                name: "summarize".to_string(),
                description: "Summarize a forecast".to_string(),
                arguments: vec![PromptArgument {
                    name: "city".to_string(),
                    description: "City name".to_string(),
                    required: true,
                }],
                template: "Summarize the weather in {{city}}".to_string(),
            }],
        }
    }

    #[test]
    fn server_code_contains_all_declared_features() {
        let code = generate_server(&sample_config());
        assert!(code.contains("server = Server(\"Weather Server\")"));
        assert!(code.contains("name=\"get_forecast\""));
        assert!(code.contains("\"city\""));
        assert!(code.contains("if name == \"get_forecast\":"));
        assert!(code.contains("return [TextContent(type=\"text\", text=\"sunny\")]"));
        assert!(code.contains("uri=AnyUrl(\"weather://current\")"));
        assert!(code.contains("PromptArgument(name=\"city\""));
        assert!(code.contains("Summarize the weather in {{city}}"));
        assert!(code.contains("asyncio.run(main())"));
    }

    #[test]
    fn empty_config_generates_placeholders() {
        let config = ServerConfig {
            id: "srv1".to_string(),
            name: "Empty".to_string(),
            ..ServerConfig::default()
        };
        let code = generate_server(&config);
        assert!(code.contains("# No tools defined"));
        assert!(code.contains("# No resources defined"));
        assert!(code.contains("# No tool handlers defined"));
        assert!(code.contains("# No prompt handlers defined"));
    }

    #[test]
    fn tool_without_implementation_gets_a_stub() {
        let config = ServerConfig {
            id: "srv1".to_string(),
            name: "Stub".to_string(),
            tools: vec![ToolSpec {
                id: "t1".to_string(),
                name: "ping".to_string(),
                ..ToolSpec::default()
            }],
            ..ServerConfig::default()
        };
        let code = generate_server(&config);
        assert!(code.contains("return \"Not implemented\""));
        // Null schema falls back to the empty-object schema.
        assert!(code.contains("\"type\": \"object\""));
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let config = ServerConfig {
            id: "srv1".to_string(),
            name: "Quoted".to_string(),
            tools: vec![ToolSpec {
                id: "t1".to_string(),
                name: "ping".to_string(),
                description: "says \"pong\"".to_string(),
                ..ToolSpec::default()
            }],
            ..ServerConfig::default()
        };
        let code = generate_server(&config);
        assert!(code.contains("says \\\"pong\\\""));
    }

    #[test]
    fn requirements_pin_the_sdk() {
        let requirements = generate_requirements();
        assert!(requirements.contains("mcp>="));
        assert!(requirements.contains("pydantic>="));
    }

    #[test]
    fn readme_lists_features() {
        let readme = generate_readme(&sample_config());
        assert!(readme.contains("# Weather Server"));
        assert!(readme.contains("- **get_forecast**: Fetch a forecast"));
        assert!(readme.contains("- **Current** (`weather://current`)"));
        assert!(readme.contains("\"weather-server\""));
    }

    #[test]
    fn readme_handles_empty_sections() {
        let config = ServerConfig {
            id: "srv1".to_string(),
            name: "Empty".to_string(),
            ..ServerConfig::default()
        };
        let readme = generate_readme(&config);
        assert!(readme.contains("No tools defined"));
        assert!(readme.contains("No resources defined"));
        assert!(readme.contains("No prompts defined"));
    }
}
