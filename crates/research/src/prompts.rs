//! Prompt templates for each generation step.
//!
//! Every prompt carries the current date so models reason about recency
//! relative to today rather than their training cutoff.

use deepsift_core::{SearchHit, Source};

use crate::state::QuerySummary;

/// Today's date in long form, e.g. "October 16, 2026".
pub fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

pub fn query_writer(
    topic: &str,
    count: usize,
    knowledge_gap: Option<&str>,
    already_issued: &[String],
    date: &str,
) -> String {
    let mut prompt = format!(
        "Your goal is to generate sophisticated and diverse web search queries for an \
         automated research tool that will analyze the results and synthesize an answer.\n\n\
         Instructions:\n\
         - Prefer a single query; only add another when the question asks for multiple \
         aspects or entities and one query is not enough.\n\
         - Each query should focus on one specific aspect of the question.\n\
         - Do not produce more than {count} queries.\n\
         - Queries must be diverse; avoid near-duplicates of each other.\n\
         - Queries should target the most current information. The current date is {date}.\n\n\
         Output a JSON object with:\n\
         - \"rationale\": a brief explanation of why these queries are relevant\n\
         - \"query\": a list of search queries\n"
    );

    if let Some(gap) = knowledge_gap.filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!(
            "\nThe previous research left this knowledge gap; target it specifically:\n{gap}\n"
        ));
    }
    if !already_issued.is_empty() {
        prompt.push_str("\nThese queries were already searched; do not repeat them:\n");
        for q in already_issued {
            prompt.push_str(&format!("- {q}\n"));
        }
    }

    prompt.push_str(&format!("\nContext: {topic}"));
    prompt
}

/// Render hits as a numbered list: `[i] title`, snippet, URL.
pub fn numbered_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("[{}] {}\n{}\nURL: {}", i + 1, h.label(), h.snippet, h.url))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn summarizer(query: &str, hits: &[SearchHit], date: &str) -> String {
    format!(
        "You are compressing web search results for the query \"{query}\" into a short, \
         factual summary. The current date is {date}.\n\n\
         Instructions:\n\
         - Use only information present in the results below.\n\
         - After every sentence that uses a result, cite it with its number in square \
         brackets, for example [1] or [2, 3].\n\
         - Only cite numbers that appear in the list.\n\
         - Keep track of dates; prefer the most recent information.\n\n\
         Output a JSON object with:\n\
         - \"summary\": the cited summary text\n\n\
         Search results:\n\n{}",
        numbered_hits(hits)
    )
}

/// Render summaries for reflection and answering.
pub fn render_summaries(summaries: &[QuerySummary]) -> String {
    if summaries.is_empty() {
        return "(no web research was gathered)".into();
    }
    summaries
        .iter()
        .map(|s| format!("Query: {}\n{}", s.query, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn reflection(
    topic: &str,
    summaries: &[QuerySummary],
    max_follow_ups: usize,
    date: &str,
) -> String {
    format!(
        "You are an expert research assistant analyzing summaries about \"{topic}\". \
         The current date is {date}.\n\n\
         Instructions:\n\
         - Decide whether the summaries are sufficient to answer the user's question.\n\
         - If they are not, identify the knowledge gap and write at most {max_follow_ups} \
         follow-up search queries that would close it.\n\
         - Follow-up queries must be self-contained and include the context a web search \
         needs.\n\
         - If the summaries are sufficient, leave the follow-up list empty.\n\n\
         Output a JSON object with:\n\
         - \"is_sufficient\": true or false\n\
         - \"knowledge_gap\": what information is missing or needs clarification\n\
         - \"follow_up_queries\": a list of queries to address the gap\n\n\
         Summaries:\n\n{}",
        render_summaries(summaries)
    )
}

pub fn answer(topic: &str, summaries: &[QuerySummary], sources: &[Source], date: &str) -> String {
    let source_list = if sources.is_empty() {
        "(none)".to_string()
    } else {
        sources
            .iter()
            .map(|s| format!("[{}] {} ({})", s.id, s.label, s.url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Generate a high-quality answer to the user's question based on the research \
         below. The current date is {date}.\n\n\
         Instructions:\n\
         - Write the answer for the user; do not mention that you are working from \
         summaries.\n\
         - Support claims with citations copied exactly from the research, using the \
         source ids in square brackets such as [S1] or [S2, S5].\n\
         - Only cite ids that appear in the source list. If there is no research, answer \
         from the conversation alone without citations.\n\n\
         Output a JSON object with:\n\
         - \"answer\": the final answer text with inline citations\n\n\
         User context:\n{topic}\n\n\
         Research:\n\n{}\n\n\
         Sources:\n{source_list}",
        render_summaries(summaries)
    )
}
