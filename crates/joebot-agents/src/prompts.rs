use joebot_models::{ConversationState, FilterSchema};

use crate::parser::FETCH_TOOL;

/// System prompt for the planning agent. Includes the filter schema so the
/// planner only proposes fields the fetcher will accept.
pub fn planner_system_prompt(schema: &FilterSchema) -> String {
    let tool_example = serde_json::json!({
        "tool": FETCH_TOOL,
        "arguments": {
            "fetch_type": "compare",
            "filters": {"institution": "Harvard"},
            "compare_by": "year",
            "compare_values": [2023, 2024]
        }
    });
    let answer_example = serde_json::json!({
        "answer": "Harvard posted 14 jobs in 2023 and 17 in 2024."
    });

    format!(
        "You are an economics job-market analyst answering questions about AEA JOE \
         (Job Openings for Economists) postings.\n\
         - Tone: professional, academic and factual.\n\
         - Style: clear and concise. Do not bold numbers.\n\
         - Never invent data. Every number you report must come from a tool result.\n\n\
         ## TOOL\n\n\
         You can query the posting database with the `{FETCH_TOOL}` tool. To call it, reply \
         with ONLY this JSON object and nothing else:\n\
         {tool}\n\n\
         When you have enough data, reply with ONLY:\n\
         {answer}\n\n\
         Call the tool once per reply. Tool results are returned to you in the next message.\n\
         If the user asks for a chart, graph or plot, set \"visualize\": true on a stats or \
         compare call; the chart is attached automatically.\n\n\
         ## SCHEMA\n\n\
         {schema}",
        tool = serde_json::to_string(&tool_example).unwrap_or_default(),
        answer = serde_json::to_string(&answer_example).unwrap_or_default(),
        schema = schema.describe(),
    )
}

/// User prompt for one planning turn: the question plus every tool call
/// and result so far.
pub fn planner_user_prompt(conversation: &ConversationState, remaining_tool_calls: usize) -> String {
    let mut prompt = format!("Question: {}\n", conversation.query);

    if !conversation.exchanges.is_empty() {
        prompt.push_str("\n## TOOL RESULTS SO FAR\n");
        for exchange in &conversation.exchanges {
            prompt.push_str(&format!(
                "\nCall {}: {}\nResult: {}\n",
                exchange.call.index,
                serde_json::to_string(&exchange.call.spec).unwrap_or_default(),
                serde_json::to_string(&exchange.result).unwrap_or_default(),
            ));
        }
    }

    if remaining_tool_calls == 0 {
        prompt.push_str("\nNo tool calls remain. Reply with your final answer now.\n");
    } else {
        prompt.push_str(&format!(
            "\nTool calls remaining: {remaining_tool_calls}.\n"
        ));
    }
    prompt
}

/// Returned when help is requested.
pub fn help_text(list_cap: usize) -> String {
    format!(
        "I answer questions about AEA JOE job postings. Try:\n\
         - How many jobs were posted in 2024?\n\
         - Show jobs at Harvard\n\
         - Compare 2022 vs 2024\n\
         - Jobs by state since 2020\n\
         - How many postdoc positions in California?\n\
         - Chart jobs by year\n\n\
         Filters: year, year ranges (since 2020, between 2019 and 2023), institution, \
         country, state, job type, department, field (JEL code) and keywords. \
         Lists show up to {list_cap} postings, newest first."
    )
}
