use std::env;
use std::error::Error;
use std::fs;

use payload_engine::{Context, Engine, EngineConfig, MemoryContext};

/// Upserts a JSON payload file into an in-memory store and prints the records.
///
/// Usage: `payload-engine <config.yaml> <entity> <payload.json>`
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [config_path, entity, payload_path] = args.as_slice() else {
        return Err("usage: payload-engine <config.yaml> <entity> <payload.json>".into());
    };

    let config = EngineConfig::from_file(config_path)?;
    let Some(entity_config) = config.entity(entity) else {
        return Err(format!("entity `{entity}` is not configured").into());
    };
    let engine = Engine::<MemoryContext>::from_config(&config)?;

    let payload: serde_json::Value = serde_json::from_str(&fs::read_to_string(payload_path)?)?;
    let mut ctx = MemoryContext::new();
    let records = engine.upsert_json(&mut ctx, entity, payload)?;

    for record in &records {
        let attributes: Vec<String> = entity_config
            .attributes
            .iter()
            .filter_map(|attribute| {
                ctx.attribute(record, &attribute.name)
                    .map(|value| format!("{}={value}", attribute.name))
            })
            .collect();
        println!("{record} {}", attributes.join(" "));
    }

    Ok(())
}
