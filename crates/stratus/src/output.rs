use colored::Colorize;
use serde_json::Value;

/// Render a JSON field for a table cell
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) if s.is_empty() => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn column_widths(items: &[Value], columns: &[&str]) -> Vec<usize> {
    columns
        .iter()
        .map(|col| {
            items
                .iter()
                .map(|item| cell(item.get(*col)).chars().count())
                .chain(std::iter::once(col.len()))
                .max()
                .unwrap_or(col.len())
        })
        .collect()
}

pub fn print_list(items: &[Value], total: u64, columns: &[&str]) {
    if items.is_empty() {
        println!("{}", "No instance groups".dimmed());
        return;
    }

    let widths = column_widths(items, columns);
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("{:<w$}", col.to_uppercase(), w = *w))
        .collect();
    println!("{}", header.join("  ").bold());
    println!("{}", "─".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)).dimmed());

    for item in items {
        let row: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<w$}", cell(item.get(*col)), w = *w))
            .collect();
        println!("{}", row.join("  "));
    }

    println!();
    println!("{} {}/{}", "Total:".dimmed(), items.len(), total);
}

pub fn print_object(value: &Value) {
    let Some(object) = value.as_object() else {
        println!("{}", cell(Some(value)));
        return;
    };

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    let width = keys.iter().map(|k| k.len()).max().unwrap_or(0);
    for key in keys {
        println!("{:<width$}  {}", key.cyan(), cell(object.get(key)), width = width);
    }
}
