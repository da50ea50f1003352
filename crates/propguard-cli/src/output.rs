use anyhow::Result;
use colored::Colorize;
use propguard::{Operation, PropertyDecision, PropertyRules};
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rules_json(rules: &PropertyRules, registered: &[(String, String)]) -> Value {
    let entries: Vec<Value> = rules
        .rules()
        .iter()
        .map(|rule| {
            let permissions: serde_json::Map<String, Value> = rule
                .permissions()
                .iter()
                .map(|(operation, tokens)| (operation.to_string(), json!(tokens)))
                .collect();
            json!({
                "expression": rule.pattern().as_str(),
                "permissions": permissions,
            })
        })
        .collect();
    let policies: Vec<Value> = registered
        .iter()
        .map(|(target, rule)| json!({ "target": target, "rule": rule }))
        .collect();

    json!({
        "ruleFormat": rules.rule_format().as_str(),
        "rules": entries,
        "policyRules": policies,
    })
}

/// Print the ordered ruleset and any policy rules it registered.
pub fn print_rules(
    rules: &PropertyRules,
    registered: &[(String, String)],
    format: OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(&rules_json(rules, registered));
    }

    println!("{}: {}", "Rule format".cyan(), rules.rule_format());
    if rules.is_empty() {
        println!("No rules defined; every operation is permitted.");
        return Ok(());
    }

    let mut builder = Builder::default();
    let mut header = vec!["#".to_string(), "Property expression".to_string()];
    header.extend(Operation::ALL.iter().map(ToString::to_string));
    builder.push_record(header);
    for (index, rule) in rules.rules().iter().enumerate() {
        let mut record = vec![index.to_string(), rule.pattern().as_str().to_string()];
        record.extend(Operation::ALL.iter().map(|operation| {
            let tokens = rule.permissions().get(*operation);
            if tokens.is_empty() {
                "-".to_string()
            } else {
                tokens.join(", ")
            }
        }));
        builder.push_record(record);
    }
    println!("{}", builder.build().with(Style::rounded()));

    if !registered.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Target", "Rule"]);
        for (target, rule) in registered {
            builder.push_record([target.as_str(), rule.as_str()]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }
    Ok(())
}

pub fn print_decision(
    property: &str,
    operation: &str,
    decision: &PropertyDecision,
    format: OutputFormat,
) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(&json!({
            "property": property,
            "operation": operation,
            "decision": decision,
        }));
    }

    let verdict = if decision.is_allowed() {
        format!("{} allowed", "✓".green())
    } else {
        format!("{} denied", "✗".red())
    };
    println!("{verdict}: {operation} {property}");
    println!("{}: {}", "Reason".cyan(), decision.reason);
    Ok(())
}
