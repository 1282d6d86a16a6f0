use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn truncate_value(value: &Value, max_chars: usize) -> String {
    match value {
        Value::String(text) => truncate_text(text, max_chars),
        other => truncate_text(&other.to_string(), max_chars),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimLimits {
    pub max_string_len: usize,
    pub max_list_items: usize,
    pub max_log_lines: usize,
}

impl Default for TrimLimits {
    fn default() -> Self {
        Self {
            max_string_len: 3000,
            max_list_items: 50,
            max_log_lines: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimStats {
    pub fields_trimmed: usize,
    pub string_fields_trimmed: usize,
    pub chars_removed: usize,
    pub lines_removed: usize,
    pub lists_trimmed: usize,
    pub total_nested_paths_touched: usize,
}

pub fn trim_large_fields(
    value: &Map<String, Value>,
    limits: &TrimLimits,
) -> (Map<String, Value>, TrimStats) {
    let mut stats = TrimStats::default();
    let trimmed = trim_object(value, limits, &mut stats);
    (trimmed, stats)
}

fn trim_object(
    value: &Map<String, Value>,
    limits: &TrimLimits,
    stats: &mut TrimStats,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, field) in value {
        stats.total_nested_paths_touched += 1;
        let trimmed = match field {
            Value::String(text) => trim_string(text, limits, stats),
            Value::Array(items) if items.len() > limits.max_list_items => {
                stats.fields_trimmed += 1;
                stats.lists_trimmed += 1;
                let mut kept: Vec<Value> = items[..limits.max_list_items].to_vec();
                kept.push(Value::String("... (list trimmed)".to_string()));
                Value::Array(kept)
            }
            Value::Object(inner) => Value::Object(trim_object(inner, limits, stats)),
            other => other.clone(),
        };
        out.insert(key.clone(), trimmed);
    }
    out
}

fn trim_string(text: &str, limits: &TrimLimits, stats: &mut TrimStats) -> Value {
    let line_count = text.lines().count();
    if line_count > limits.max_log_lines {
        stats.fields_trimmed += 1;
        stats.string_fields_trimmed += 1;
        stats.lines_removed += line_count - limits.max_log_lines;
        let kept = text
            .lines()
            .take(limits.max_log_lines)
            .collect::<Vec<_>>()
            .join("\n");
        return Value::String(format!(
            "{kept}\n... (trimmed @ {} lines)",
            limits.max_log_lines
        ));
    }
    let char_count = text.chars().count();
    if char_count > limits.max_string_len {
        stats.fields_trimmed += 1;
        stats.string_fields_trimmed += 1;
        stats.chars_removed += char_count - limits.max_string_len;
        let kept: String = text.chars().take(limits.max_string_len).collect();
        return Value::String(format!(
            "{kept}\n... (trimmed @ {} chars)",
            limits.max_string_len
        ));
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_text_appends_marker_only_when_cut() {
        assert_eq!(truncate_text("short", 16), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc...[TRUNCATED]");
    }

    #[test]
    fn truncate_value_stringifies_non_strings() {
        assert_eq!(truncate_value(&json!(123), 10), "123");
        assert_eq!(truncate_value(&json!("txt"), 10), "txt");
    }

    #[test]
    fn trim_large_fields_bounds_nested_logs_and_lists() {
        let log = (0..10)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let input = json!({
            "outer": {"log": log, "items": [1, 2, 3, 4]},
            "long": "x".repeat(20),
            "ok": "fine",
        });
        let limits = TrimLimits {
            max_string_len: 8,
            max_list_items: 2,
            max_log_lines: 3,
        };
        let (trimmed, stats) = trim_large_fields(input.as_object().expect("object"), &limits);

        let nested_log = trimmed["outer"]["log"].as_str().expect("log string");
        assert!(nested_log.starts_with("line 0\nline 1\nline 2\n"));
        assert!(nested_log.ends_with("(trimmed @ 3 lines)"));
        assert_eq!(trimmed["outer"]["items"].as_array().expect("items").len(), 3);
        assert!(trimmed["long"].as_str().expect("long").ends_with("(trimmed @ 8 chars)"));
        assert_eq!(trimmed["ok"], "fine");
        assert_eq!(stats.lines_removed, 7);
        assert_eq!(stats.chars_removed, 12);
        assert_eq!(stats.lists_trimmed, 1);
        assert_eq!(stats.fields_trimmed, 3);
    }
}
