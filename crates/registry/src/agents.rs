//! Renders the agent registry (`agents.ts`).

use crate::module_path::{relative_specifier, strip_source_extension};
use crate::ts;
use discovery_protocol::{type_name, AgentMetadata};
use std::fmt::Write as _;

/// Generated names for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentNames {
    /// PascalCase prefix of the agent's type aliases
    pub type_name: String,
    /// Local binding of the agent's default export
    pub import: String,
}

impl AgentNames {
    pub fn of(agent: &AgentMetadata) -> Self {
        let type_name = type_name(&agent.canonical_name);
        let import = format!("{type_name}Agent");
        Self { type_name, import }
    }
}

/// Specifier of an agent's definition module, as seen from `output_dir`.
pub fn agent_specifier(agent: &AgentMetadata, output_dir: &str) -> String {
    relative_specifier(output_dir, strip_source_extension(&agent.filename))
}

/// Render `agents.ts` for agents already sorted by canonical name.
pub fn render_agents(agents: &[AgentMetadata], runtime_module: &str, output_dir: &str) -> String {
    let runtime = ts::string_literal(runtime_module);
    let named: Vec<(&AgentMetadata, AgentNames)> =
        agents.iter().map(|agent| (agent, AgentNames::of(agent))).collect();

    let mut out = String::from(ts::GENERATED_HEADER);
    let _ = writeln!(
        &mut out,
        "\nimport type {{ AgentRunner, InferInput, InferOutput }} from {runtime};"
    );
    if !named.is_empty() {
        out.push('\n');
    }
    for (agent, names) in &named {
        let _ = writeln!(
            &mut out,
            "import {} from {};",
            names.import,
            ts::string_literal(&agent_specifier(agent, output_dir))
        );
    }

    for (agent, names) in &named {
        render_agent_types(&mut out, agent, names);
    }

    out.push_str("\nexport const agents = {\n");
    for (agent, names) in &named {
        let _ = writeln!(
            &mut out,
            "  {}: {},",
            ts::property_key(&agent.canonical_name),
            names.import
        );
    }
    out.push_str("} as const;\n\nexport type AgentName = keyof typeof agents;\n");

    let _ = writeln!(&mut out, "\ndeclare module {runtime} {{");
    out.push_str("  interface AgentRegistry {\n");
    for (agent, names) in &named {
        let t = &names.type_name;
        let _ = writeln!(
            &mut out,
            "    {}: {{\n      agent: typeof {};\n      identityId: {};\n      input: {t}Input;\n      output: {t}Output;\n      stream: {t}Stream;\n    }};",
            ts::property_key(&agent.canonical_name),
            names.import,
            ts::string_literal(&agent.identity.identity_id),
        );
    }
    out.push_str("  }\n}\n");
    out
}

fn render_agent_types(out: &mut String, agent: &AgentMetadata, names: &AgentNames) {
    let t = &names.type_name;
    let agent_ref = &names.import;
    let input = if agent.input_schema.is_some() {
        format!("InferInput<typeof {agent_ref}>")
    } else {
        "undefined".to_string()
    };
    let output = if agent.output_schema.is_some() {
        format!("InferOutput<typeof {agent_ref}>")
    } else {
        "undefined".to_string()
    };

    out.push('\n');
    let _ = writeln!(out, "// {} ({})", agent.name, agent.filename);
    if let Some(description) = &agent.description {
        out.push_str(&ts::doc_comment(description, ""));
    }
    let _ = writeln!(out, "export type {t}Input = {input};");
    let _ = writeln!(out, "export type {t}Output = {output};");
    let _ = writeln!(out, "export type {t}Stream = {};", agent.streaming);
    let _ = writeln!(
        out,
        "export type {t}Schema = {{ input: {t}Input; output: {t}Output; stream: {t}Stream }};"
    );
    let _ = writeln!(
        out,
        "export type {t}Runner = AgentRunner<{t}Input, {t}Output, {t}Stream>;"
    );
}
