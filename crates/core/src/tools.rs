// Tool-call presentation helpers
//
// Tool bubbles show a human-readable title looked up by tool name and a body
// derived from the call arguments. Hosted tools (web search, document search)
// get bodies of their own instead of raw arguments.

use std::collections::HashMap;

use serde_json::Value;

pub const WEB_SEARCH_TOOL: &str = "bing_grounding";
pub const FILE_SEARCH_TOOL: &str = "file_search";

/// Body shown while a document search runs
pub const FILE_SEARCH_PLACEHOLDER: &str = "searching docs...";

/// Built-in titles for the bundled demo tools
pub const DEFAULT_TOOL_TITLES: &[(&str, &str)] = &[
    ("fetch_weather", "☁️ fetching weather"),
    ("fetch_datetime", "🕒 fetching datetime"),
    ("fetch_stock_price", "📈 fetching financial info"),
    ("send_email", "✉️ sending mail"),
    (FILE_SEARCH_TOOL, "📄 searching docs"),
    (WEB_SEARCH_TOOL, "🔍 searching bing"),
];

/// How a tool's bubble body is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Client-side function; body is the (partial) argument text
    Function,
    /// Hosted web search; body is the search query
    WebSearch,
    /// Hosted document search; body is a fixed placeholder
    FileSearch,
}

impl ToolKind {
    pub fn from_tool_name(tool_name: &str) -> Self {
        match tool_name {
            WEB_SEARCH_TOOL => ToolKind::WebSearch,
            FILE_SEARCH_TOOL => ToolKind::FileSearch,
            _ => ToolKind::Function,
        }
    }

    /// Bubble body for a start event of this kind
    pub fn start_body(&self, arguments: Option<&Value>) -> String {
        match self {
            ToolKind::Function => arguments.map(render_arguments).unwrap_or_default(),
            ToolKind::WebSearch => {
                let request_url = arguments
                    .and_then(|args| args.get("requesturl"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                extract_search_query(request_url)
            }
            ToolKind::FileSearch => FILE_SEARCH_PLACEHOLDER.to_string(),
        }
    }
}

/// Tool name to bubble title table
#[derive(Debug, Clone)]
pub struct ToolTitles {
    titles: HashMap<String, String>,
}

impl Default for ToolTitles {
    fn default() -> Self {
        Self {
            titles: DEFAULT_TOOL_TITLES
                .iter()
                .map(|(name, title)| (name.to_string(), title.to_string()))
                .collect(),
        }
    }
}

impl ToolTitles {
    /// Table with no entries; every tool gets the fallback title
    pub fn empty() -> Self {
        Self {
            titles: HashMap::new(),
        }
    }

    pub fn with_title(mut self, tool_name: impl Into<String>, title: impl Into<String>) -> Self {
        self.titles.insert(tool_name.into(), title.into());
        self
    }

    /// Merge entries over the current table
    pub fn extend(&mut self, titles: impl IntoIterator<Item = (String, String)>) {
        self.titles.extend(titles);
    }

    pub fn title_for(&self, tool_name: &str) -> String {
        self.titles
            .get(tool_name)
            .cloned()
            .unwrap_or_else(|| format!("🛠 calling {}", tool_name))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Render tool arguments for display: strings verbatim, JSON otherwise
pub fn render_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the search query from a web search request url.
///
/// `https://api.bing.microsoft.com/v7.0/search?q="latest news"` yields
/// `latest news`. Falls back to the raw url when there is no `q` parameter.
pub fn extract_search_query(request_url: &str) -> String {
    let Ok(parsed) = url::Url::parse(request_url) else {
        return request_url.to_string();
    };

    parsed
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|query| !query.is_empty())
        .unwrap_or_else(|| request_url.to_string())
}
