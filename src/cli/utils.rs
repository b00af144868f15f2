use serde_json::{json, Value};

use crate::catalog::ModuleDescriptor;
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(body)) = (data, response.as_object_mut()) {
                body.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a module list, or the empty-state message when there is none
pub fn output_modules(
    output_format: &OutputFormat,
    collection_name: &str,
    modules: &[ModuleDescriptor],
    favorites: &[String],
    empty_message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: modules,
                    "favorites": favorites,
                }))?
            );
        }
        OutputFormat::Text => {
            if modules.is_empty() {
                println!("{}", empty_message);
                return Ok(());
            }
            for module in modules {
                let star = if favorites.contains(&module.path) { "★" } else { " " };
                println!("{} {:<28} {}", star, module.name, module.path);
                if let Some(desc) = module.description.as_deref().filter(|d| !d.is_empty()) {
                    println!("    {}", desc);
                }
            }
        }
    }
    Ok(())
}
