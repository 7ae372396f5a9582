use anyhow::Result;
use cieid_sdk::callback::{AuthFailure, CallbackSink};
use cieid_sdk::events::Event;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Table => {
            print_as_table(value);
        }
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn print_as_table(value: &Value) {
    let Some(fields) = value.as_object() else {
        println!("{value}");
        return;
    };

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, field) in fields {
        let shown = match field {
            Value::String(s) if s.is_empty() => "-".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        builder.push_record([key.as_str(), shown.as_str()]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

/// Sink printing every notification to the terminal.
pub struct ConsoleSink;

impl CallbackSink for ConsoleSink {
    fn on_event(&self, event: &Event) {
        println!("{} {}", "•".cyan(), event.as_str().cyan());
    }

    fn on_error(&self, failure: &AuthFailure) {
        match failure.event() {
            Some(Event::PinError { attempts_remaining }) => print_error(&format!(
                "{} ({} attempts remaining)",
                failure, attempts_remaining
            )),
            Some(event) => print_error(&format!("{} [{}]", event, event.family())),
            None => print_error(&failure.to_string()),
        }
    }

    fn on_success(&self, url: &str) {
        print_success(url);
    }
}
