//! `deepsift providers`: List supported search and LLM backends.

use deepsift_config::{LlmProviderKind, SearchProviderKind};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", listing());
    Ok(())
}

fn listing() -> String {
    let mut out = String::from("Search backends (--search):\n");
    for kind in SearchProviderKind::ALL {
        out.push_str(&format!("  {:<10} {}\n", kind.as_str(), kind.description()));
    }
    out.push_str("\nLLM backends (--llm):\n");
    for kind in LlmProviderKind::ALL {
        out.push_str(&format!("  {:<10} {}\n", kind.as_str(), kind.description()));
    }
    out.push_str(
        "\nEnvironment variables:\n  \
         GEMINI_API_KEY, OPENAI_API_KEY, BRAVE_API_KEY, SEARXNG_BASE_URL\n  \
         DEEPSIFT_LLM_PROVIDER, DEEPSIFT_SEARCH_PROVIDER, DEEPSIFT_MODEL\n  \
         NUMBER_OF_INITIAL_QUERIES, MAX_RESEARCH_LOOPS\n",
    );
    out
}
