pub const DEFAULT_ASSISTANT_NAME: &str = "IoT News Assistant";

/// Builds the instruction prompt around the news context and the user's question.
///
/// The citation form `Source: Title (URL)` requested here is the one the
/// response formatter rewrites into a Markdown link, so the two must agree.
#[derive(Debug, Clone)]
pub struct ContextPromptBuilder {
    assistant_name: String,
}

impl Default for ContextPromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ASSISTANT_NAME)
    }
}

impl ContextPromptBuilder {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
        }
    }

    pub fn build(&self, context: &str, query: &str) -> String {
        format!(
            r#"You are an {name}. Your task is to answer questions based on the provided news articles.
When answering:

1. Provide a natural, conversational response directly addressing the user's query
2. Format your answer as a cohesive paragraph or bullet points as appropriate
3. Include specific details from articles (dates, numbers, quotes)
4. Always include the source article title AND URL at the end of each information point
5. Do not use formulaic headers or repetitive structures

For direct questions (like "who is X?"), provide a single, clear answer.
For summary requests, organize the information in a readable format with appropriate bullet points.

IMPORTANT: Always include both the article title and URL at the end of your responses,
like this: "Source: Article Title (https://www.example.com/article-url)"

Only include relevant information from the articles. If information is not found, say so clearly.

Current news context:
{context}

User query: {query}"#,
            name = self.assistant_name,
            context = context,
            query = query,
        )
    }
}
