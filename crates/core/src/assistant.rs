use crate::completion::{ChatMessage, ChatModel};
use crate::embeddings::Embedder;
use crate::orchestrator::{RetrievedContext, Retriever, DEFAULT_TOP_K};
use crate::traits::VectorIndex;
use crate::AssistantError;
use tracing::info;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an internal assistant for the organization. \
Answer only from the document excerpts you are given. If the excerpts do not cover the question, \
say that no reliable information is available and suggest which document would be needed. \
Never invent rules, facts or sources.";

const CONTEXT_PREAMBLE: &str = "The following excerpts come from internal documents. \
Each excerpt starts with its source file in brackets. Use them to ground your answer and \
cite a source only when it actually supports the statement.";

const NO_CONTEXT_NOTE: &str = "No document excerpts were found for this question. \
Do not cite any source and do not present guesses as facts.";

#[derive(Debug, Clone)]
pub struct Answer {
    pub reply: String,
    pub sources: Vec<String>,
}

impl Answer {
    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Builds the message list sent to the chat model.
pub fn build_messages(system_prompt: &str, context: &str, question: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt)];

    if context.is_empty() {
        messages.push(ChatMessage::system(NO_CONTEXT_NOTE));
    } else {
        messages.push(ChatMessage::system(format!("{CONTEXT_PREAMBLE}\n\n{context}")));
    }

    messages.push(ChatMessage::user(question));
    messages
}

/// Answers a question with retrieved context and a chat model.
pub struct Assistant<E, V, C> {
    retriever: Retriever<E, V>,
    chat: C,
    system_prompt: String,
    top_k: usize,
}

impl<E, V, C> Assistant<E, V, C>
where
    E: Embedder,
    V: VectorIndex,
    C: ChatModel,
{
    pub fn new(retriever: Retriever<E, V>, chat: C) -> Self {
        Self {
            retriever,
            chat,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn retriever(&self) -> &Retriever<E, V> {
        &self.retriever
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        let context = self.retriever.retrieve(question, self.top_k).await?;
        if let RetrievedContext::Degraded(error) = &context {
            info!(%error, "answering without document context");
        }

        let messages = build_messages(&self.system_prompt, &context.render(), question);
        let reply = self.chat.complete(&messages).await?;

        Ok(Answer {
            reply,
            sources: context.sources(),
        })
    }
}
