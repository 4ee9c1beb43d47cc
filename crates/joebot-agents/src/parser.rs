use joebot_models::{FilterSpec, PlannerDecision};
use serde_json::Value;

use crate::error::PlanningFailure;

/// Name of the single tool the planner can call.
pub const FETCH_TOOL: &str = "fetch_job_data";

/// Prefixes models like to put in front of final answers.
const ANSWER_PREFIXES: [&str; 7] = [
    "summary:",
    "summary.",
    "response:",
    "answer:",
    "to answer:",
    "to answer.",
    "result:",
];

/// The first JSON object in a completion, as text.
///
/// A fenced block (```` ```json ```` or a bare ```` ``` ````) is searched
/// first. Otherwise each `{` is tried in turn as the start of an object, so
/// prose and stray braces around the object are skipped.
pub fn extract_json(text: &str) -> Result<String, PlanningFailure> {
    fenced_block(text)
        .into_iter()
        .chain(std::iter::once(text))
        .find_map(first_object)
        .ok_or_else(|| {
            PlanningFailure::Malformed(format!(
                "No valid JSON object found in response (length={})",
                text.len()
            ))
        })
}

/// Body of the first fenced code block tagged `json` or untagged.
fn fenced_block(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once("```")?;
    let (tag, rest) = rest.split_once('\n')?;
    let tag = tag.trim();
    if !tag.is_empty() && !tag.eq_ignore_ascii_case("json") {
        return None;
    }
    rest.split_once("```").map(|(body, _)| body)
}

/// Text of the first complete object starting at some `{`.
fn first_object(text: &str) -> Option<String> {
    text.match_indices('{').find_map(|(start, _)| {
        let tail = &text[start..];
        let mut values = serde_json::Deserializer::from_str(tail).into_iter::<Value>();
        match values.next()? {
            Ok(Value::Object(_)) => Some(tail[..values.byte_offset()].to_string()),
            _ => None,
        }
    })
}

/// Strip one leading "Answer:"-style prefix, case-insensitively.
pub fn clean_answer(text: &str) -> String {
    let cleaned = text.trim();
    for prefix in ANSWER_PREFIXES {
        if cleaned
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            return cleaned[prefix.len()..].trim().to_string();
        }
    }
    cleaned.to_string()
}

/// Turn raw completion text into a planner decision.
///
/// - `{"tool": "fetch_job_data", "arguments": {...}}` is a tool call.
/// - `{"answer": "..."}` is a final answer.
/// - Text with no JSON object is a final answer.
/// - Anything else, or an empty answer, is malformed.
pub fn parse_planner_output(raw: &str) -> Result<PlannerDecision, PlanningFailure> {
    if raw.trim().is_empty() {
        return Err(PlanningFailure::Malformed("empty completion".to_string()));
    }

    let Ok(json_str) = extract_json(raw) else {
        return final_answer(raw);
    };
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| PlanningFailure::Malformed(format!("planner JSON: {e}")))?;

    if let Some(tool) = value.get("tool").and_then(Value::as_str) {
        if tool != FETCH_TOOL {
            return Err(PlanningFailure::Malformed(format!("unknown tool `{tool}`")));
        }
        let arguments = value
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        // Some models send arguments as a JSON string.
        let arguments = match arguments {
            Value::String(s) => serde_json::from_str(&s).map_err(|e| {
                PlanningFailure::Malformed(format!("tool arguments string: {e}"))
            })?,
            other => other,
        };
        let spec: FilterSpec = serde_json::from_value(arguments)
            .map_err(|e| PlanningFailure::Malformed(format!("tool arguments: {e}")))?;
        return Ok(PlannerDecision::Fetch(spec));
    }

    if let Some(answer) = value.get("answer").and_then(Value::as_str) {
        return final_answer(answer);
    }

    Err(PlanningFailure::Malformed(
        "JSON is neither a tool call nor an answer".to_string(),
    ))
}

fn final_answer(text: &str) -> Result<PlannerDecision, PlanningFailure> {
    let cleaned = clean_answer(text);
    if cleaned.is_empty() {
        Err(PlanningFailure::Malformed("empty answer".to_string()))
    } else {
        Ok(PlannerDecision::Answer(cleaned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joebot_models::{FetchType, FilterValue, ScalarValue};

    #[test]
    fn extract_clean_json() {
        let input = r#"{"tool": "fetch_job_data", "arguments": {}}"#;
        let result = extract_json(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn extract_from_markdown() {
        let input = "Here is my plan:\n```json\n{\"answer\": \"12\"}\n```\nDone.";
        let result = extract_json(input).unwrap();
        assert_eq!(result, r#"{"answer": "12"}"#);
    }

    #[test]
    fn extract_from_markdown_no_lang() {
        let input = "Result:\n```\n{\"answer\": \"12\"}\n```";
        let result = extract_json(input).unwrap();
        assert_eq!(result, r#"{"answer": "12"}"#);
    }

    #[test]
    fn extract_with_braces_in_strings() {
        let input = r#"{"answer": "the set {a, b} is small", "x": 1}"#;
        let result = extract_json(input).unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["x"], 1);
    }

    #[test]
    fn extract_no_json() {
        assert!(extract_json("This is just plain text with no JSON at all.").is_err());
    }

    #[test]
    fn non_json_fence_falls_back_to_text() {
        let input = "```python\nprint(1)\n```\n{\"answer\": \"3\"}";
        assert_eq!(extract_json(input).unwrap(), r#"{"answer": "3"}"#);
    }

    #[test]
    fn unbalanced_brace_before_object_is_skipped() {
        let input = r#"Plan: {incomplete then {"tool": "fetch_job_data", "arguments": {}} ok"#;
        assert_eq!(
            extract_json(input).unwrap(),
            r#"{"tool": "fetch_job_data", "arguments": {}}"#
        );
    }

    #[test]
    fn stray_closing_brace_does_not_confuse_extraction() {
        let input = "oops } then {\"answer\": \"ok\"}";
        assert_eq!(extract_json(input).unwrap(), r#"{"answer": "ok"}"#);
    }

    #[test]
    fn parses_tool_call() {
        let raw = r#"I'll look that up.
```json
{"tool": "fetch_job_data", "arguments": {"fetch_type": "count", "filters": {"institution": "MIT", "year": 2024}}}
```"#;
        let PlannerDecision::Fetch(spec) = parse_planner_output(raw).unwrap() else {
            panic!("expected a tool call");
        };
        assert_eq!(spec.fetch_type, FetchType::Count);
        assert_eq!(
            spec.filters["year"],
            FilterValue::One(ScalarValue::Int(2024))
        );
    }

    #[test]
    fn parses_stringified_arguments() {
        let raw = r#"{"tool": "fetch_job_data", "arguments": "{\"fetch_type\": \"list\"}"}"#;
        assert_eq!(
            parse_planner_output(raw).unwrap(),
            PlannerDecision::Fetch(FilterSpec::new(FetchType::List))
        );
    }

    #[test]
    fn parses_json_answer_and_strips_prefix() {
        let raw = r#"{"answer": "Answer: There were 42 postings in 2024."}"#;
        assert_eq!(
            parse_planner_output(raw).unwrap(),
            PlannerDecision::Answer("There were 42 postings in 2024.".to_string())
        );
    }

    #[test]
    fn plain_text_is_final_answer() {
        assert_eq!(
            parse_planner_output("Summary: MIT posted 3 jobs.").unwrap(),
            PlannerDecision::Answer("MIT posted 3 jobs.".to_string())
        );
    }

    #[test]
    fn unknown_tool_is_malformed() {
        let raw = r#"{"tool": "get_last_sql", "arguments": {}}"#;
        assert!(matches!(
            parse_planner_output(raw),
            Err(PlanningFailure::Malformed(_))
        ));
    }

    #[test]
    fn bad_arguments_are_malformed() {
        let raw = r#"{"tool": "fetch_job_data", "arguments": {"fetch_type": "histogram"}}"#;
        assert!(matches!(
            parse_planner_output(raw),
            Err(PlanningFailure::Malformed(_))
        ));
    }

    #[test]
    fn unrecognized_json_is_malformed() {
        assert!(parse_planner_output(r#"{"status": "thinking"}"#).is_err());
    }

    #[test]
    fn empty_output_is_malformed() {
        assert!(parse_planner_output("   \n").is_err());
        assert!(parse_planner_output(r#"{"answer": "Result:"}"#).is_err());
    }

    #[test]
    fn clean_answer_removes_only_one_prefix() {
        assert_eq!(clean_answer("  RESULT: answer: 5 "), "answer: 5");
        assert_eq!(clean_answer("No prefix here"), "No prefix here");
    }
}
