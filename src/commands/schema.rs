use crate::ui;
use anyhow::{Context as _, Result};
use artifactory::Provider;
use colored::Colorize;
use declarative::{Attribute, Schema, ValueType};

/// Flags shown next to an attribute
fn flags(attribute: &Attribute) -> String {
    let mut flags = Vec::new();
    if attribute.required {
        flags.push("required".to_string());
    } else if attribute.optional {
        flags.push("optional".to_string());
    }
    if attribute.computed {
        flags.push("computed".to_string());
    }
    if attribute.force_new {
        flags.push("forces replacement".to_string());
    }
    if attribute.sensitive {
        flags.push("sensitive".to_string());
    }
    if let Some(max) = attribute.max_items {
        flags.push(format!("max {max}"));
    }
    if let Some(default) = &attribute.default {
        flags.push(format!("default {default}"));
    }
    flags.join(", ")
}

/// Render a schema as indented lines
pub fn describe(schema: &Schema, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth + 1);
    let mut lines = Vec::new();
    for (name, attribute) in schema.iter() {
        lines.push(format!(
            "{indent}{} {} {}",
            name.bold(),
            attribute.ty.name().cyan(),
            format!("({})", flags(attribute)).dimmed()
        ));
        if !attribute.description.is_empty() {
            lines.push(format!("{indent}    {}", attribute.description));
        }
        if let Some(message) = &attribute.deprecated {
            lines.push(format!("{indent}    {} {message}", "deprecated:".yellow()));
        }
        if let ValueType::Block(inner) = &attribute.ty {
            lines.extend(describe(inner, depth + 2));
        }
    }
    lines
}

pub fn run(resource_type: Option<&str>) -> Result<()> {
    let provider = Provider::new();
    let resources = provider.resources();

    let Some(resource_type) = resource_type else {
        ui::header(&format!("{} resource types", resources.len()));
        for name in resources.names() {
            println!("  {name}");
        }
        return Ok(());
    };

    let definition = resources
        .get(resource_type)
        .with_context(|| format!("unsupported resource type {resource_type:?}"))?;
    ui::header(resource_type);
    if let Some(message) = &definition.deprecation {
        ui::warn(message);
    }
    for line in describe(&definition.schema, 0) {
        println!("{line}");
    }
    Ok(())
}
